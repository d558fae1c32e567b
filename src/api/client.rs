use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::models::{
    DownloadRequest, HistoryEntry, HistoryResponse, Progress, StartDownloadResponse,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// No base URL was resolved; the supervisor failed and no override is set.
    #[error("Downloader service unavailable.")]
    Unavailable,

    /// Network-level failure or a malformed response body.
    #[error("Unable to reach downloader service.")]
    Unreachable,

    /// Non-success HTTP status; the message is the service's own when present.
    #[error("{0}")]
    Service(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

/// HTTP gateway to the worker service.
///
/// Every operation resolves to the uniform `Result` envelope; nothing
/// here panics or raises past the boundary.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
    ) -> Result<T> {
        let base = self.base_url.as_deref().ok_or(GatewayError::Unavailable)?;

        let mut builder = self.http.request(method, format!("{base}{endpoint}"));
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder.send().await.map_err(|err| {
            debug!(endpoint, error = %err, "downloader request failed");
            GatewayError::Unreachable
        })?;

        let status = response.status();
        // Tolerate empty or non-JSON bodies the same way on every path.
        let payload: Value = response
            .json()
            .await
            .unwrap_or_else(|_| Value::Object(Default::default()));

        if !status.is_success() {
            let message = payload
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| format!("Request failed ({})", status.as_u16()));
            return Err(GatewayError::Service(message));
        }

        serde_json::from_value(payload).map_err(|err| {
            debug!(endpoint, error = %err, "malformed downloader response");
            GatewayError::Unreachable
        })
    }

    /// Start a download; returns the freshly created job's progress view.
    pub async fn start_download(&self, request: &DownloadRequest) -> Result<Progress> {
        let body = serde_json::json!({
            "url": request.url,
            "format": request.format.as_str(),
            "output_dir": request.output_dir.to_string_lossy(),
        });
        let response: StartDownloadResponse =
            self.request(Method::POST, "/download", Some(body)).await?;
        Ok(response.job)
    }

    /// Snapshot of the active job, or an idle payload when none is running.
    pub async fn progress(&self) -> Result<Progress> {
        self.request(Method::GET, "/progress", None).await
    }

    /// Request cancellation of the active job. The ack body is discarded;
    /// the next progress poll is authoritative.
    pub async fn cancel(&self) -> Result<()> {
        let _ack: Value = self.request(Method::POST, "/cancel", None).await?;
        Ok(())
    }

    pub async fn history(&self) -> Result<Vec<HistoryEntry>> {
        let response: HistoryResponse = self.request(Method::GET, "/history", None).await?;
        Ok(response.history)
    }
}
