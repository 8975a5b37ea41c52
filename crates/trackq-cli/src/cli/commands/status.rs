//! `trackq status` – show records of a running instance.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use trackq_core::control::{self, ControlRequest};
use trackq_core::store::DownloadRecord;

use crate::cli::control_socket;

pub async fn run_status() -> Result<()> {
    let path = control::default_control_socket_path()?;
    let reply = control_socket::request(&path, &ControlRequest::Status).await?;
    if let Some(msg) = reply.strip_prefix("error ") {
        bail!("{}", msg.trim());
    }
    let records = reply
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str::<Value>(l).context("parse status line"))
        .collect::<Result<Vec<_>>>()?;
    if records.is_empty() {
        println!("No downloads.");
        return Ok(());
    }
    println!("{:<12} {:<12} {:>4}  {}", "ID", "STATUS", "%", "TRACK / RESULT");
    for rec in records {
        let str_field = |v: &Value| v.as_str().unwrap_or("").to_string();
        let detail = rec
            .get("resultFilename")
            .or_else(|| rec.get("errorMessage"))
            .map(str_field)
            .unwrap_or_else(|| {
                format!(
                    "{} - {}",
                    str_field(&rec["track"]["artist"]),
                    str_field(&rec["track"]["title"])
                )
            });
        println!(
            "{:<12} {:<12} {:>4}  {}",
            str_field(&rec["track"]["id"]),
            str_field(&rec["status"]),
            rec["progress"].as_u64().unwrap_or(0),
            detail
        );
    }
    Ok(())
}

/// One progress line for `trackq run`.
pub(crate) fn record_line(rec: &DownloadRecord) -> String {
    let detail = rec
        .result_filename
        .as_deref()
        .or(rec.error_message.as_deref())
        .map(str::to_string)
        .unwrap_or_else(|| rec.track.display_name());
    let quality = rec.quality.map(|q| q.as_str()).unwrap_or("-");
    format!(
        "  [{:>3}%] {:<11} {:<15} {}",
        rec.progress,
        rec.status.as_str(),
        quality,
        detail
    )
}
