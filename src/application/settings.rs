use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Persisted user preferences. One record, overwritten whole on change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "savePath", default = "default_save_path")]
    pub save_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            save_path: default_save_path(),
        }
    }
}

fn default_save_path() -> PathBuf {
    UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Save path is required.")]
    MissingPath,

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write settings: {0}")]
    Write(#[from] io::Error),
}

/// Reads and writes the single `settings.json` under the per-app config
/// directory. Single-process assumption; no locking.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn from_project_dirs() -> Self {
        let path = ProjectDirs::from("com", "tubedesk", "TubeDesk")
            .map(|dirs| dirs.config_dir().join("settings.json"))
            .unwrap_or_else(|| PathBuf::from("settings.json"));
        Self::new(path)
    }

    /// Load settings, falling back to defaults on any read or parse error.
    /// Missing fields are filled in from defaults by serde.
    pub fn load(&self) -> Settings {
        match fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                debug!(path = %self.path.display(), error = %err, "settings unreadable, using defaults");
                Settings::default()
            }),
            Err(_) => Settings::default(),
        }
    }

    /// Merge the new save path into the current settings and persist.
    pub fn set_save_path(&self, save_path: PathBuf) -> Result<Settings, SettingsError> {
        if save_path.as_os_str().is_empty() {
            return Err(SettingsError::MissingPath);
        }

        let mut settings = self.load();
        settings.save_path = save_path;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&settings)?)?;

        Ok(settings)
    }
}
