//! `trackq run` – enqueue track lists, run the scheduler and print progress.

use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use trackq_core::config::TrackqConfig;
use trackq_core::control;
use trackq_core::notify::{LogNotifier, Notice, NoticeLevel, Notifier};
use trackq_core::quality::Quality;
use trackq_core::store::DownloadStatus;
use trackq_core::track::load_tracks;
use trackq_core::Orchestrator;

use super::status::record_line;
use crate::cli::control_socket;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub struct RunOptions {
    pub files: Vec<PathBuf>,
    pub jobs: Option<usize>,
    pub quality: Option<Quality>,
    pub serve: bool,
}

/// Prints notifications on stderr and logs them.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        let prefix = match notice.level {
            NoticeLevel::Warning => "warning: ",
            NoticeLevel::Error => "error: ",
        };
        eprintln!("{}{}", prefix, notice.message);
        LogNotifier.notify(notice);
    }
}

pub async fn run_queue(mut cfg: TrackqConfig, opts: RunOptions) -> Result<()> {
    if let Some(jobs) = opts.jobs {
        cfg.max_concurrent_downloads = jobs;
    }
    if let Some(quality) = opts.quality {
        cfg.quality = quality;
    }
    let orch = Arc::new(Orchestrator::from_config(&cfg, Arc::new(ConsoleNotifier))?);

    for file in &opts.files {
        let tracks = load_tracks(file)?;
        let summary = orch.enqueue(tracks);
        println!(
            "Queued {} track(s) from {} ({} already pending)",
            summary.added,
            file.display(),
            summary.skipped
        );
    }
    if !opts.serve && orch.store().is_drained() {
        println!("No tracks to download.");
        return Ok(());
    }

    let stop = Arc::new(Notify::new());
    let socket_path = control::default_control_socket_path().ok();
    let listener = match socket_path.as_deref() {
        Some(path) => {
            match control_socket::spawn_control_listener(Arc::clone(&orch), Arc::clone(&stop), path) {
                Ok(handle) => {
                    tracing::debug!(path = %path.display(), "control socket listening");
                    Some(handle)
                }
                Err(e) => {
                    tracing::warn!("control socket unavailable: {:#}", e);
                    None
                }
            }
        }
        None => None,
    };

    let printer = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move {
            let mut changes = orch.subscribe();
            let mut shown: HashMap<String, (DownloadStatus, u8)> = HashMap::new();
            loop {
                for rec in orch.records() {
                    let state = (rec.status, rec.progress);
                    if shown.get(&rec.track.id) != Some(&state) {
                        println!("{}", record_line(&rec));
                        shown.insert(rec.track.id.clone(), state);
                    }
                }
                if changes.changed().await.is_err() {
                    break;
                }
                tokio::time::sleep(PROGRESS_INTERVAL).await;
            }
        })
    };

    orch.start();
    if opts.serve {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
            _ = stop.notified() => {}
        }
    } else {
        tokio::select! {
            _ = orch.wait_until_drained() => {}
            _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
            _ = stop.notified() => {}
        }
    }
    orch.stop().await;
    printer.abort();
    if let Some(handle) = listener {
        handle.abort();
    }
    if let Some(path) = socket_path {
        let _ = std::fs::remove_file(path);
    }

    let records = orch.records();
    let completed = records
        .iter()
        .filter(|r| r.status == DownloadStatus::Completed)
        .count();
    let failed: Vec<_> = records
        .iter()
        .filter(|r| r.status == DownloadStatus::Failed)
        .collect();
    let failed_count = failed.len();
    println!("Completed: {}  Failed: {}", completed, failed_count);
    for rec in failed {
        println!("{}", record_line(rec));
    }
    tracing::info!(completed, failed = failed_count, "run finished");
    Ok(())
}
