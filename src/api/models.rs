use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{JobStatus, MediaFormat};

/// Snapshot of the active job reported by `/progress` and `/download`.
///
/// The service answers `{"status": "idle"}` with no other fields when
/// nothing is running, so everything except `status` is defaulted.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Progress {
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub percent: f32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub filepath: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Progress {
    /// Percent clamped into [0, 100] for display.
    pub fn display_percent(&self) -> f32 {
        self.percent.clamp(0.0, 100.0)
    }

    /// Filename if known, else the title.
    pub fn display_name(&self) -> Option<&str> {
        self.filename.as_deref().or(self.title.as_deref())
    }
}

/// One finished (or failed) job from the service's `/history` list.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryEntry {
    pub id: String,
    pub url: String,
    pub format: MediaFormat,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub percent: f32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub filepath: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl HistoryEntry {
    /// Row label: title, else filename, else the submitted URL.
    pub fn display_name(&self) -> &str {
        self.title
            .as_deref()
            .or(self.filename.as_deref())
            .unwrap_or(&self.url)
    }

    /// The filepath, but only when the entry may be opened from disk.
    pub fn completed_filepath(&self) -> Option<&str> {
        match (self.status, self.filepath.as_deref()) {
            (JobStatus::Completed, Some(path)) => Some(path),
            _ => None,
        }
    }
}

/// User-facing download request; the client maps it onto the wire shape.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub format: MediaFormat,
    pub output_dir: PathBuf,
}

/// Response from the /download endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct StartDownloadResponse {
    pub job: Progress,
}

/// Response from the /history endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}
