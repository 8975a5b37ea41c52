//! CLI for the trackq download queue orchestrator.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use trackq_core::config;
use trackq_core::quality::Quality;

use commands::{run_add, run_queue, run_status, run_stop, RunOptions};

/// Top-level CLI for trackq.
#[derive(Debug, Parser)]
#[command(name = "trackq")]
#[command(about = "trackq: download queue for a music library backend", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/trackq/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download tracks from JSON track lists and serve the control socket.
    Run {
        /// Track list files (JSON arrays of tracks).
        files: Vec<PathBuf>,
        /// Maximum simultaneous downloads (overrides config).
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
        /// Requested quality: HI_RES_LOSSLESS or LOSSLESS (overrides config).
        #[arg(long, value_name = "QUALITY")]
        quality: Option<Quality>,
        /// Keep running after the queue drains; exit on Ctrl-C or `trackq stop`.
        #[arg(long)]
        serve: bool,
    },

    /// Add a track list to a running `trackq run`.
    Add {
        /// Path to the JSON track list.
        file: PathBuf,
    },

    /// Show records of a running `trackq run`.
    Status,

    /// Stop a running `trackq run`.
    Stop,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Run {
                files,
                jobs,
                quality,
                serve,
            } => {
                let mut cfg = match cli.config.as_deref() {
                    Some(path) => config::load_from_path(path)?,
                    None => config::load_or_init()?,
                };
                cfg.apply_env();
                tracing::debug!(backend = %cfg.backend_url, "loaded config");
                let opts = RunOptions {
                    files,
                    jobs,
                    quality,
                    serve,
                };
                run_queue(cfg, opts).await?;
            }
            CliCommand::Add { file } => run_add(&file).await?,
            CliCommand::Status => run_status().await?,
            CliCommand::Stop => run_stop().await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
