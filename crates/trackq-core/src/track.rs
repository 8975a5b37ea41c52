//! Track references: what the presentation layer enqueues.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Client-held descriptor of a song to download.
///
/// `id` is the client-local identity (stable list key); `tidal_id` is the
/// remote catalog identity the backend understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tidal_id: Option<i64>,
    pub artist: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_id: Option<i64>,
}

impl TrackRef {
    pub fn new(id: impl Into<String>, artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tidal_id: None,
            artist: artist.into(),
            title: title.into(),
            album: None,
            cover: None,
            track_number: None,
            album_id: None,
        }
    }

    pub fn with_tidal_id(mut self, tidal_id: i64) -> Self {
        self.tidal_id = Some(tidal_id);
        self
    }

    /// Remote identity: `tidal_id`, else `id` when it is numeric.
    pub fn remote_id(&self) -> Option<i64> {
        self.tidal_id.or_else(|| self.id.trim().parse::<i64>().ok())
    }

    /// Name used when the backend does not report a filename.
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }
}

/// Reads a JSON array of track references (camelCase keys).
pub fn load_tracks(path: &Path) -> Result<Vec<TrackRef>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("read track list {}", path.display()))?;
    let tracks: Vec<TrackRef> = serde_json::from_str(&data)
        .with_context(|| format!("parse track list {}", path.display()))?;
    Ok(tracks)
}
