mod api;
mod app;
mod application;
mod domain;
mod ui;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use iced::{window, Size, Task};
use tracing_subscriber::EnvFilter;

use api::ApiClient;
use app::{DownloadApp, Message};
use application::{supervisor, Coordinator, ServiceHandle, SettingsStore};

fn main() -> iced::Result {
    init_tracing();

    iced::application(boot, app::update, app::view)
        .title("TubeDesk")
        .subscription(app::subscription)
        .window(window::Settings {
            size: Size::new(980.0, 720.0),
            min_size: Some(Size::new(820.0, 640.0)),
            // Close requests flow through the app so the worker can be
            // stopped first.
            exit_on_close_request: false,
            ..Default::default()
        })
        .run()
}

fn boot() -> (DownloadApp, Task<Message>) {
    let coordinator = Coordinator::new(ApiClient::new(None), SettingsStore::from_project_dirs());
    let app = DownloadApp::new(coordinator);

    (
        app,
        Task::perform(start_service(), Message::ServiceStarted),
    )
}

/// Resolve the worker service: an externally supplied URL wins,
/// otherwise spawn and supervise our own worker process.
async fn start_service() -> Result<Arc<ServiceHandle>, String> {
    if let Ok(base_url) = env::var("YT_DOWNLOADER_API_URL") {
        return Ok(Arc::new(ServiceHandle::external(base_url)));
    }

    supervisor::start(&service_base_path(), supervisor::DEFAULT_PORT)
        .await
        .map(Arc::new)
        .map_err(|err| err.to_string())
}

fn service_base_path() -> PathBuf {
    if let Some(base) = env::var_os("YT_DOWNLOADER_BASE_PATH") {
        return PathBuf::from(base);
    }
    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tubedesk=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
