//! Start-download request and its immediate response.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::BackendClient;
use crate::config::DownloadOptions;
use crate::error::DownloadError;
use crate::quality::Quality;
use crate::track::TrackRef;

/// Body of `POST download/track`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadRequest {
    pub track_id: i64,
    pub artist: String,
    pub title: String,
    pub quality: Quality,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    pub organization_template: String,
    pub group_compilations: bool,
    pub run_beets: bool,
    pub embed_lyrics: bool,
}

impl DownloadRequest {
    pub fn for_track(
        track: &TrackRef,
        remote_id: i64,
        quality: Quality,
        options: &DownloadOptions,
    ) -> Self {
        Self {
            track_id: remote_id,
            artist: track.artist.clone(),
            title: track.title.clone(),
            quality,
            album: track.album.clone(),
            album_id: track.album_id,
            track_number: track.track_number,
            cover: track.cover.clone(),
            organization_template: options.organization_template.clone(),
            group_compilations: options.group_compilations,
            run_beets: options.run_beets,
            embed_lyrics: options.embed_lyrics,
        }
    }
}

/// What the backend said right after the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Download started; completion arrives on the progress stream.
    Downloading { filename: Option<String> },
    /// File is already in the library.
    Exists {
        filename: Option<String>,
        path: Option<String>,
    },
}

impl SubmitOutcome {
    /// Reported filename, or the last component of the reported path.
    pub fn filename(&self) -> Option<String> {
        match self {
            SubmitOutcome::Downloading { filename } => filename.clone(),
            SubmitOutcome::Exists { filename, path } => filename.clone().or_else(|| {
                path.as_deref()
                    .and_then(|p| Path::new(p).file_name())
                    .map(|n| n.to_string_lossy().into_owned())
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    status: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    path: Option<String>,
}

impl BackendClient {
    /// Sends the start-download command.
    pub async fn submit(&self, request: &DownloadRequest) -> Result<SubmitOutcome, DownloadError> {
        let url = self.endpoint("download/track")?;
        let response = self
            .authorize(self.http.post(url).timeout(self.request_timeout).json(request))
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(self.unauthorized());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DownloadError::Submission {
                status: status.as_u16(),
                detail: error_detail(status.as_u16(), &body),
            });
        }
        let body = response.text().await?;
        let parsed: SubmitResponse = serde_json::from_str(&body)
            .map_err(|e| DownloadError::Protocol(format!("invalid submit response: {}", e)))?;
        outcome_from(parsed)
    }
}

fn outcome_from(resp: SubmitResponse) -> Result<SubmitOutcome, DownloadError> {
    match resp.status.as_str() {
        "downloading" => Ok(SubmitOutcome::Downloading {
            filename: resp.filename,
        }),
        "exists" => Ok(SubmitOutcome::Exists {
            filename: resp.filename,
            path: resp.path,
        }),
        other => Err(DownloadError::Protocol(format!(
            "unknown submit status '{}'",
            other
        ))),
    }
}

/// Backend error text: the `detail` field when present, else `HTTP <code>`.
fn error_detail(status: u16, body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => match value.get("detail") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => format!("HTTP {}", status),
        },
        Err(_) if !body.trim().is_empty() => format!("HTTP {}: {}", status, body.trim()),
        Err(_) => format!("HTTP {}", status),
    }
}
