pub mod client;
pub mod models;

pub use client::{ApiClient, GatewayError, Result};
pub use models::{DownloadRequest, HistoryEntry, Progress};
