use std::path::{Path, PathBuf};

use tracing::warn;

use crate::api::{self, ApiClient, DownloadRequest, HistoryEntry, Progress};
use crate::application::settings::{Settings, SettingsError, SettingsStore};

/// Everything loaded when the UI mounts. Service-backed parts are `None`
/// when the corresponding call failed; the UI keeps its empty state.
#[derive(Debug, Clone)]
pub struct InitialSnapshot {
    pub settings: Settings,
    pub history: Option<Vec<HistoryEntry>>,
    pub progress: Option<Progress>,
}

/// The single facade the UI layer talks to: gateway operations, settings
/// operations, and the two OS shell operations.
#[derive(Clone)]
pub struct Coordinator {
    client: ApiClient,
    settings: SettingsStore,
}

impl Coordinator {
    pub fn new(client: ApiClient, settings: SettingsStore) -> Self {
        Self { client, settings }
    }

    /// Install the resolved service base URL once the supervisor is done.
    pub fn attach_service(&mut self, base_url: String) {
        self.client = ApiClient::new(Some(base_url));
    }

    /// Settings plus the concurrent history/progress fetch done on mount.
    pub async fn load_initial(&self) -> InitialSnapshot {
        let settings = self.settings.load();
        let (history, progress) = futures::join!(self.client.history(), self.client.progress());
        InitialSnapshot {
            settings,
            history: history.ok(),
            progress: progress.ok(),
        }
    }

    pub async fn start_download(&self, request: DownloadRequest) -> api::Result<Progress> {
        self.client.start_download(&request).await
    }

    pub async fn fetch_progress(&self) -> api::Result<Progress> {
        self.client.progress().await
    }

    pub async fn cancel_download(&self) -> api::Result<()> {
        self.client.cancel().await
    }

    pub async fn fetch_history(&self) -> api::Result<Vec<HistoryEntry>> {
        self.client.history().await
    }

    pub fn set_save_path(&self, path: PathBuf) -> Result<Settings, SettingsError> {
        self.settings.set_save_path(path)
    }

    /// Open the native folder picker; `None` means the user cancelled,
    /// which is not an error and must not change any state.
    pub async fn select_save_folder(&self) -> Result<Option<Settings>, SettingsError> {
        let current = self.settings.load().save_path;

        let mut dialog = rfd::AsyncFileDialog::new();
        if current.is_dir() {
            dialog = dialog.set_directory(&current);
        }

        match dialog.pick_folder().await {
            Some(folder) => self.set_save_path(folder.path().to_path_buf()).map(Some),
            None => Ok(None),
        }
    }

    /// Fire-and-forget: open a completed file with the default app.
    pub fn open_file(path: &str) {
        if let Err(err) = open::that_detached(path) {
            warn!(path, error = %err, "failed to open file");
        }
    }

    /// Fire-and-forget: open the directory containing `path`.
    pub fn reveal_in_folder(path: &str) {
        let path = Path::new(path);
        let target = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(path);
        if let Err(err) = open::that_detached(target) {
            warn!(path = %path.display(), error = %err, "failed to open folder");
        }
    }
}
