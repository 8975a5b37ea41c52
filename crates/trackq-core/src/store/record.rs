//! Per-track runtime record held in the shared store.

use serde::Serialize;

use crate::quality::Quality;
use crate::track::TrackRef;

/// Lifecycle status of a download record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Queued,
    Downloading,
    Completed,
    Failed,
}

impl DownloadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DownloadStatus::Queued => "queued",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Failed => "failed",
        }
    }

    /// Completed or failed; a final record is never mutated again.
    pub fn is_final(self) -> bool {
        matches!(self, DownloadStatus::Completed | DownloadStatus::Failed)
    }
}

/// How a driver finalized a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed { filename: String },
    Failed { message: String },
}

/// Status/progress entry rendered by the presentation layer.
///
/// `error_message` is present iff `status == Failed`; `result_filename`
/// iff `status == Completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRecord {
    pub track: TrackRef,
    pub status: DownloadStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<Quality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_filename: Option<String>,
}

impl DownloadRecord {
    pub(crate) fn queued(track: TrackRef) -> Self {
        Self {
            track,
            status: DownloadStatus::Queued,
            progress: 0,
            quality: None,
            error_message: None,
            result_filename: None,
        }
    }

    pub(crate) fn finalize(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Completed { filename } => {
                self.status = DownloadStatus::Completed;
                self.progress = 100;
                self.result_filename = Some(filename);
                self.error_message = None;
            }
            Outcome::Failed { message } => {
                self.status = DownloadStatus::Failed;
                self.error_message = Some(message);
                self.result_filename = None;
            }
        }
    }
}
