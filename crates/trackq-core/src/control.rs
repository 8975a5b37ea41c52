//! Control protocol between `trackq run` and the `add` / `status` / `stop`
//! commands. One request line per connection over a Unix socket:
//!
//! - `enqueue <json array of tracks>` → `added <n>`
//! - `status` → one JSON record per line
//! - `stop` → `ok`
//!
//! Anything else is answered with `error <message>`.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use crate::store::{DownloadRecord, EnqueueSummary};
use crate::track::TrackRef;

#[derive(Debug, Clone, PartialEq)]
pub enum ControlRequest {
    Enqueue(Vec<TrackRef>),
    Status,
    Stop,
}

impl ControlRequest {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((v, r)) => (v, r.trim()),
            None => (line, ""),
        };
        match verb {
            "enqueue" => {
                let tracks: Vec<TrackRef> =
                    serde_json::from_str(rest).context("parse enqueue payload")?;
                Ok(ControlRequest::Enqueue(tracks))
            }
            "status" if rest.is_empty() => Ok(ControlRequest::Status),
            "stop" if rest.is_empty() => Ok(ControlRequest::Stop),
            "" => bail!("empty request"),
            _ => bail!("unknown request '{}'", line),
        }
    }

    /// Wire form, newline-terminated.
    pub fn to_line(&self) -> Result<String> {
        Ok(match self {
            ControlRequest::Enqueue(tracks) => {
                format!("enqueue {}\n", serde_json::to_string(tracks)?)
            }
            ControlRequest::Status => "status\n".to_string(),
            ControlRequest::Stop => "stop\n".to_string(),
        })
    }
}

pub fn added_reply(summary: EnqueueSummary) -> String {
    format!("added {}\n", summary.added)
}

pub fn error_reply(err: &anyhow::Error) -> String {
    format!("error {:#}\n", err).replace('\n', " ").trim_end().to_string() + "\n"
}

/// `status` reply body: one JSON object per record.
pub fn status_reply(records: &[DownloadRecord]) -> Result<String> {
    let mut out = String::new();
    for rec in records {
        out.push_str(&serde_json::to_string(rec)?);
        out.push('\n');
    }
    Ok(out)
}

/// Parses the first line of a reply. `error <message>` becomes Err.
pub fn parse_added(reply: &str) -> Result<usize> {
    let line = reply.lines().next().unwrap_or("").trim();
    if let Some(msg) = line.strip_prefix("error ") {
        bail!("{}", msg);
    }
    match line.strip_prefix("added ") {
        Some(n) => n.trim().parse().context("parse added count"),
        None => bail!("unexpected reply '{}'", line),
    }
}

/// Default path for the control socket (XDG state dir).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("trackq")?.get_state_home();
    Ok(dir.join("trackq").join("control.sock"))
}
