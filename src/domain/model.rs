use serde::{Deserialize, Serialize};

/// Lifecycle state of a download job, as reported by the worker service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Idle,
    Queued,
    Downloading,
    Processing,
    Completed,
    Cancelled,
    Error,
}

impl JobStatus {
    /// Terminal statuses end the job; no further transitions are expected.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Cancelled | JobStatus::Error
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            JobStatus::Idle => "Idle",
            JobStatus::Queued => "Queued",
            JobStatus::Downloading => "Downloading",
            JobStatus::Processing => "Processing",
            JobStatus::Completed => "Completed",
            JobStatus::Cancelled => "Cancelled",
            JobStatus::Error => "Failed",
        }
    }
}

/// Output format the user can request from the worker service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    #[default]
    Mp4,
    Mp3,
}

impl MediaFormat {
    /// Wire name expected by the service's `/download` endpoint.
    pub fn as_str(self) -> &'static str {
        match self {
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Mp3 => "mp3",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MediaFormat::Mp4 => "MP4",
            MediaFormat::Mp3 => "MP3",
        }
    }
}
