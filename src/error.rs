// Error types for feedreel.
// Covers transport, parsing, persistent-store and general failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Persistent store quota exceeded ({used} of {quota} bytes)")]
    QuotaExceeded { used: u64, quota: u64 },

    #[error("{0}")]
    Other(String),
}

impl FeedError {
    /// Whether this error means the persistent store is out of room.
    pub fn is_quota(&self) -> bool {
        matches!(self, FeedError::QuotaExceeded { .. })
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;
