use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 4545;

const START_TIMEOUT: Duration = Duration::from_secs(8);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(300);
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_millis(500);
const HEALTH_ENDPOINT: &str = "/health";

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Failed to launch downloader worker: {0}")]
    Spawn(io::Error),

    #[error("Unable to start downloader service.")]
    NoHealthyWorker,
}

/// Owning handle to the spawned worker process.
///
/// `stop` is idempotent and safe to call when no process exists, e.g.
/// when the handle wraps an externally supplied service URL.
#[derive(Debug)]
pub struct ServiceHandle {
    base_url: String,
    child: Mutex<Option<Child>>,
}

impl ServiceHandle {
    /// Wrap an already-running service; nothing to spawn or stop.
    pub fn external(base_url: String) -> Self {
        Self {
            base_url,
            child: Mutex::new(None),
        }
    }

    fn spawned(base_url: String, child: Child) -> Self {
        Self {
            base_url,
            child: Mutex::new(Some(child)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Terminate the worker process, if one was spawned.
    pub fn stop(&self) {
        if let Ok(mut guard) = self.child.lock() {
            if let Some(mut child) = guard.take() {
                if let Err(err) = child.start_kill() {
                    warn!(error = %err, "failed to stop downloader worker");
                }
            }
        }
    }
}

fn worker_script(base_path: &Path) -> PathBuf {
    base_path
        .join("services")
        .join("downloader")
        .join("app")
        .join("server.py")
}

fn python_candidates() -> &'static [&'static str] {
    if cfg!(windows) {
        &["python"]
    } else {
        &["python3", "python"]
    }
}

/// Launch the worker and wait until its health endpoint answers.
///
/// Tries each interpreter candidate in order; a candidate that spawns
/// but never becomes healthy within the timeout window is killed before
/// the next one is tried. All candidates failing surfaces the last
/// spawn error, else a generic failure.
pub async fn start(base_path: &Path, port: u16) -> Result<ServiceHandle, SupervisorError> {
    let script = worker_script(base_path);
    let base_url = format!("http://127.0.0.1:{port}");
    let mut last_spawn_error = None;

    for &candidate in python_candidates() {
        let spawned = Command::new(candidate)
            .arg(&script)
            .env("YT_DOWNLOADER_PORT", port.to_string())
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(err) => {
                warn!(candidate, error = %err, "failed to spawn downloader worker");
                last_spawn_error = Some(err);
                continue;
            }
        };

        if wait_for_healthy(&base_url, START_TIMEOUT).await {
            info!(candidate, %base_url, "downloader worker is healthy");
            return Ok(ServiceHandle::spawned(base_url, child));
        }

        warn!(candidate, "downloader worker never became healthy");
        if let Err(err) = child.start_kill() {
            warn!(error = %err, "failed to kill unhealthy worker");
        }
    }

    match last_spawn_error {
        Some(err) => Err(SupervisorError::Spawn(err)),
        None => Err(SupervisorError::NoHealthyWorker),
    }
}

/// Poll the health endpoint until it answers 2xx or the deadline passes.
async fn wait_for_healthy(base_url: &str, timeout: Duration) -> bool {
    let Ok(client) = reqwest::Client::builder()
        .timeout(HEALTH_PROBE_TIMEOUT)
        .build()
    else {
        return false;
    };

    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        let healthy = client
            .get(format!("{base_url}{HEALTH_ENDPOINT}"))
            .send()
            .await
            .map(|response| response.status().is_success())
            .unwrap_or(false);
        if healthy {
            return true;
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_is_idempotent_without_a_child() {
        let handle = ServiceHandle::external("http://127.0.0.1:4545".to_string());
        handle.stop();
        handle.stop();
        assert_eq!(handle.base_url(), "http://127.0.0.1:4545");
    }

    #[test]
    fn candidate_list_is_platform_dependent() {
        let candidates = python_candidates();
        assert!(!candidates.is_empty());
        if cfg!(windows) {
            assert_eq!(candidates, ["python"]);
        } else {
            assert_eq!(candidates, ["python3", "python"]);
        }
    }

    #[test]
    fn worker_script_lives_under_base_path() {
        let script = worker_script(Path::new("/opt/app"));
        assert!(script.starts_with("/opt/app"));
        assert!(script.ends_with("services/downloader/app/server.py"));
    }

    #[tokio::test]
    async fn wait_for_healthy_accepts_a_2xx_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(r#"{"status":"ok"}"#)
            .create_async()
            .await;

        assert!(wait_for_healthy(&server.url(), Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn wait_for_healthy_times_out_on_failing_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/health")
            .with_status(500)
            .create_async()
            .await;

        assert!(!wait_for_healthy(&server.url(), Duration::from_millis(700)).await);
    }
}
