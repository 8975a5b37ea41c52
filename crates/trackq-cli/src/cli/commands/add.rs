//! `trackq add <file>` – enqueue a track list into a running instance.

use anyhow::Result;
use std::path::Path;
use trackq_core::control::{self, ControlRequest};
use trackq_core::track::load_tracks;

use crate::cli::control_socket;

pub async fn run_add(file: &Path) -> Result<()> {
    let tracks = load_tracks(file)?;
    let total = tracks.len();
    let path = control::default_control_socket_path()?;
    let reply = control_socket::request(&path, &ControlRequest::Enqueue(tracks)).await?;
    let added = control::parse_added(&reply)?;
    println!("Queued {added} of {total} track(s)");
    Ok(())
}
