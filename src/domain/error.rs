use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppError {
    #[error("Paste a YouTube URL to start.")]
    EmptyUrl,
}
