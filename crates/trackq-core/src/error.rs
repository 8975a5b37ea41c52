//! Errors produced while driving one track.
//!
//! Every variant is caught at the driver boundary and written into the
//! track's record; none of them reach the scheduler loop.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// Track has no remote identity; no request is made.
    #[error("Track ID is missing")]
    MissingIdentity,

    /// Start-download request answered non-2xx. `detail` is the backend's text.
    #[error("{detail}")]
    Submission { status: u16, detail: String },

    #[error("Download progress not found on server")]
    ChannelNotFound,

    #[error("Download failed on server")]
    ChannelFailed,

    #[error("Download timed out after {0:?}")]
    ChannelTimeout(Duration),

    #[error("Lost connection to progress stream: {0}")]
    ChannelConnectionLost(String),

    #[error("Authentication required")]
    AuthRequired,

    #[error("Download stopped")]
    Stopped,

    /// Request could not be sent or its body could not be read.
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// 2xx response whose body we do not understand.
    #[error("Unexpected backend response: {0}")]
    Protocol(String),
}

impl DownloadError {
    /// True for submission failures meaning "this tier is not available".
    /// Matches on the backend's detail text ("not found", "404").
    pub fn is_quality_unavailable(&self) -> bool {
        match self {
            DownloadError::Submission { detail, .. } => {
                detail.contains("404") || detail.to_ascii_lowercase().contains("not found")
            }
            _ => false,
        }
    }

    /// True when the failure was caused by a stop request rather than the download.
    pub fn is_stopped(&self) -> bool {
        matches!(self, DownloadError::Stopped)
    }
}
