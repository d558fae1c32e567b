use std::sync::Arc;
use std::time::Duration;

use iced::{time, window, Subscription, Task};
use tracing::{debug, info, warn};

use crate::api::{DownloadRequest, HistoryEntry, Progress};
use crate::application::{Coordinator, InitialSnapshot, ServiceHandle, Settings};
use crate::domain::JobStatus;
use crate::ui::{DownloadMessage, DownloadView};

/// Renderer-side progress poll cadence.
const POLL_INTERVAL: Duration = Duration::from_millis(600);

pub struct DownloadApp {
    view: DownloadView,
    coordinator: Coordinator,
    service: Option<Arc<ServiceHandle>>,
    /// Guards against overlapping /progress requests across poll ticks.
    poll_in_flight: bool,
}

impl DownloadApp {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            view: DownloadView::default(),
            coordinator,
            service: None,
            poll_in_flight: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(DownloadMessage),
    /// Outcome of spawning (or adopting) the worker service.
    ServiceStarted(Result<Arc<ServiceHandle>, String>),
    /// Settings, history and progress loaded on mount.
    Loaded(InitialSnapshot),
    DownloadStarted(Result<Progress, String>),
    PollTick,
    ProgressFetched(Result<Progress, String>),
    HistoryFetched(Result<Vec<HistoryEntry>, String>),
    CancelAcked(Result<(), String>),
    /// None when the user dismissed the folder picker.
    FolderSelected(Result<Option<Settings>, String>),
    CloseRequested(window::Id),
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());
            handle_ui(app, ui_msg)
        }
        Message::ServiceStarted(Ok(handle)) => {
            info!(base_url = handle.base_url(), "downloader service ready");
            app.coordinator.attach_service(handle.base_url().to_owned());
            app.service = Some(handle);
            load_initial(app)
        }
        Message::ServiceStarted(Err(error)) => {
            // Non-fatal: the gateway keeps answering "unavailable".
            warn!(%error, "downloader service failed to start");
            load_initial(app)
        }
        Message::Loaded(snapshot) => {
            app.view.save_path = Some(snapshot.settings.save_path);
            if let Some(history) = snapshot.history {
                app.view.history = history;
            }
            if let Some(progress) = snapshot.progress {
                let status = progress.status;
                let refresh = app.view.apply_progress(progress);
                if !status.is_terminal() && status != JobStatus::Idle {
                    // A job survived a UI restart; pick the poll loop back up.
                    app.view.start_polling();
                }
                if refresh {
                    return fetch_history(app);
                }
            }
            Task::none()
        }
        Message::DownloadStarted(Ok(job)) => {
            app.view.progress = Some(job);
            app.view.start_polling();
            Task::none()
        }
        Message::DownloadStarted(Err(error)) => {
            app.view.error = Some(error);
            app.view.busy = false;
            Task::none()
        }
        Message::PollTick => {
            if app.poll_in_flight {
                return Task::none();
            }
            app.poll_in_flight = true;
            let coordinator = app.coordinator.clone();
            Task::perform(
                async move {
                    coordinator
                        .fetch_progress()
                        .await
                        .map_err(|err| err.to_string())
                },
                Message::ProgressFetched,
            )
        }
        Message::ProgressFetched(result) => {
            app.poll_in_flight = false;
            match result {
                Ok(progress) => {
                    if app.view.apply_progress(progress) {
                        fetch_history(app)
                    } else {
                        Task::none()
                    }
                }
                Err(error) => {
                    app.view.fail(error);
                    Task::none()
                }
            }
        }
        Message::HistoryFetched(Ok(history)) => {
            app.view.history = history;
            Task::none()
        }
        Message::HistoryFetched(Err(error)) => {
            // History is cosmetic; keep the previous list.
            debug!(%error, "history refresh failed");
            Task::none()
        }
        Message::CancelAcked(Ok(())) => Task::none(),
        Message::CancelAcked(Err(error)) => {
            // Busy state is left for the next poll tick to resolve;
            // cancellation is asynchronous on the service side.
            app.view.error = Some(error);
            Task::none()
        }
        Message::FolderSelected(Ok(Some(settings))) => {
            app.view.save_path = Some(settings.save_path);
            Task::none()
        }
        Message::FolderSelected(Ok(None)) => Task::none(),
        Message::FolderSelected(Err(error)) => {
            app.view.error = Some(error);
            Task::none()
        }
        Message::CloseRequested(id) => {
            if let Some(service) = &app.service {
                service.stop();
            }
            window::close(id)
        }
    }
}

fn handle_ui(app: &mut DownloadApp, message: DownloadMessage) -> Task<Message> {
    match message {
        DownloadMessage::DownloadPressed => {
            if app.view.busy {
                return Task::none();
            }
            if let Err(err) = app.view.validate_submit() {
                app.view.error = Some(err.to_string());
                return Task::none();
            }

            app.view.error = None;
            app.view.busy = true;

            let request = DownloadRequest {
                url: app.view.url.trim().to_owned(),
                format: app.view.format,
                output_dir: app.view.save_path.clone().unwrap_or_default(),
            };
            let coordinator = app.coordinator.clone();
            Task::perform(
                async move {
                    coordinator
                        .start_download(request)
                        .await
                        .map_err(|err| err.to_string())
                },
                Message::DownloadStarted,
            )
        }
        DownloadMessage::CancelPressed => {
            let coordinator = app.coordinator.clone();
            Task::perform(
                async move {
                    coordinator
                        .cancel_download()
                        .await
                        .map_err(|err| err.to_string())
                },
                Message::CancelAcked,
            )
        }
        DownloadMessage::ChangeFolderPressed => {
            let coordinator = app.coordinator.clone();
            Task::perform(
                async move {
                    coordinator
                        .select_save_folder()
                        .await
                        .map_err(|err| err.to_string())
                },
                Message::FolderSelected,
            )
        }
        DownloadMessage::OpenFile(path) => {
            Coordinator::open_file(&path);
            Task::none()
        }
        DownloadMessage::OpenFolder(path) => {
            Coordinator::reveal_in_folder(&path);
            Task::none()
        }
        // Input edits are folded into the view by DownloadView::update.
        DownloadMessage::UrlChanged(_) | DownloadMessage::FormatPicked(_) => Task::none(),
    }
}

fn fetch_history(app: &DownloadApp) -> Task<Message> {
    let coordinator = app.coordinator.clone();
    Task::perform(
        async move {
            coordinator
                .fetch_history()
                .await
                .map_err(|err| err.to_string())
        },
        Message::HistoryFetched,
    )
}

fn load_initial(app: &DownloadApp) -> Task<Message> {
    let coordinator = app.coordinator.clone();
    Task::perform(
        async move { coordinator.load_initial().await },
        Message::Loaded,
    )
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}

pub fn subscription(app: &DownloadApp) -> Subscription<Message> {
    let close = window::close_requests().map(Message::CloseRequested);
    if app.view.polling {
        Subscription::batch([
            close,
            time::every(POLL_INTERVAL).map(|_| Message::PollTick),
        ])
    } else {
        close
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use crate::application::SettingsStore;
    use crate::domain::JobStatus;
    use std::path::PathBuf;

    fn offline_app(dir: &tempfile::TempDir) -> DownloadApp {
        DownloadApp::new(Coordinator::new(
            ApiClient::new(None),
            SettingsStore::new(dir.path().join("settings.json")),
        ))
    }

    fn progress(status: JobStatus, percent: f32) -> Progress {
        Progress {
            status,
            percent,
            ..Progress::default()
        }
    }

    #[test]
    fn empty_url_sets_a_local_error_without_going_busy() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let mut app = offline_app(&dir);

        let _ = update(
            &mut app,
            Message::UiMessage(DownloadMessage::DownloadPressed),
        );

        assert_eq!(
            app.view.error.as_deref(),
            Some("Paste a YouTube URL to start.")
        );
        assert!(!app.view.busy);
        assert!(!app.view.polling);
    }

    #[test]
    fn submitting_a_url_clears_the_error_and_goes_busy() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let mut app = offline_app(&dir);
        app.view.url = "https://youtube.com/watch?v=abc".to_string();
        app.view.error = Some("old error".to_string());

        let _ = update(
            &mut app,
            Message::UiMessage(DownloadMessage::DownloadPressed),
        );

        assert!(app.view.busy);
        assert!(app.view.error.is_none());
    }

    #[test]
    fn download_started_seeds_progress_and_starts_polling() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let mut app = offline_app(&dir);
        app.view.busy = true;

        let _ = update(
            &mut app,
            Message::DownloadStarted(Ok(progress(JobStatus::Downloading, 0.0))),
        );

        assert!(app.view.polling);
        assert!(app.view.busy);
        assert_eq!(
            app.view.progress.as_ref().map(|p| p.status),
            Some(JobStatus::Downloading)
        );
    }

    #[test]
    fn poll_ticks_never_overlap_requests() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let mut app = offline_app(&dir);
        app.view.start_polling();

        let _ = update(&mut app, Message::PollTick);
        assert!(app.poll_in_flight);

        // A second tick while the first request is outstanding is a no-op.
        let _ = update(&mut app, Message::PollTick);
        assert!(app.poll_in_flight);

        let _ = update(
            &mut app,
            Message::ProgressFetched(Ok(progress(JobStatus::Downloading, 10.0))),
        );
        assert!(!app.poll_in_flight);
    }

    #[test]
    fn poll_transport_failure_surfaces_and_halts_the_loop() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let mut app = offline_app(&dir);
        app.view.busy = true;
        app.view.start_polling();
        app.poll_in_flight = true;

        let _ = update(
            &mut app,
            Message::ProgressFetched(Err("Unable to reach downloader service.".to_string())),
        );

        assert_eq!(
            app.view.error.as_deref(),
            Some("Unable to reach downloader service.")
        );
        assert!(!app.view.busy);
        assert!(!app.view.polling);
        assert!(!app.poll_in_flight);
    }

    #[test]
    fn terminal_progress_stops_polling() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let mut app = offline_app(&dir);
        app.view.busy = true;
        app.view.start_polling();

        let _ = update(
            &mut app,
            Message::ProgressFetched(Ok(progress(JobStatus::Completed, 100.0))),
        );

        assert!(!app.view.busy);
        assert!(!app.view.polling);
    }

    #[test]
    fn cancel_failure_shows_the_error_but_leaves_busy_alone() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let mut app = offline_app(&dir);
        app.view.busy = true;
        app.view.start_polling();

        let _ = update(
            &mut app,
            Message::CancelAcked(Err("No active download to cancel.".to_string())),
        );

        assert_eq!(
            app.view.error.as_deref(),
            Some("No active download to cancel.")
        );
        assert!(app.view.busy, "cancel is resolved by the next poll tick");
        assert!(app.view.polling);
    }

    #[test]
    fn mount_resumes_polling_for_a_running_job() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let mut app = offline_app(&dir);

        let _ = update(
            &mut app,
            Message::Loaded(InitialSnapshot {
                settings: Settings {
                    save_path: PathBuf::from("/downloads"),
                },
                history: Some(Vec::new()),
                progress: Some(progress(JobStatus::Downloading, 42.0)),
            }),
        );

        assert_eq!(app.view.save_path, Some(PathBuf::from("/downloads")));
        assert!(app.view.busy);
        assert!(app.view.polling);
    }

    #[test]
    fn mount_with_terminal_progress_does_not_poll() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let mut app = offline_app(&dir);

        let _ = update(
            &mut app,
            Message::Loaded(InitialSnapshot {
                settings: Settings::default(),
                history: None,
                progress: Some(progress(JobStatus::Completed, 100.0)),
            }),
        );

        assert!(!app.view.busy);
        assert!(!app.view.polling);
    }

    #[test]
    fn folder_picker_cancellation_changes_nothing() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let mut app = offline_app(&dir);
        app.view.save_path = Some(PathBuf::from("/downloads"));

        let _ = update(&mut app, Message::FolderSelected(Ok(None)));

        assert_eq!(app.view.save_path, Some(PathBuf::from("/downloads")));
        assert!(app.view.error.is_none());
    }

    #[test]
    fn history_refresh_failure_keeps_the_previous_list() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let mut app = offline_app(&dir);
        app.view.history = vec![serde_json::from_str(
            r#"{"id":"1","url":"https://youtube.com/watch?v=abc","format":"mp4"}"#,
        )
        .unwrap()];

        let _ = update(
            &mut app,
            Message::HistoryFetched(Err("Downloader service unavailable.".to_string())),
        );

        assert_eq!(app.view.history.len(), 1);
        assert!(app.view.error.is_none());
    }
}
