//! Error types for the dashboard and camera relay

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single upstream frame fetch.
///
/// Everything except [`UpstreamError::Misconfigured`] and
/// [`UpstreamError::FeedClosed`] is the transient "upstream unavailable"
/// condition the relay absorbs with a fixed backoff.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("Upstream timed out")]
    Timeout,

    #[error("Upstream connection failed: {0}")]
    Connect(String),

    #[error("Upstream returned status {0}")]
    Status(u16),

    #[error("Upstream body read failed: {0}")]
    Body(String),

    #[error("Upstream misconfigured: {0}")]
    Misconfigured(String),

    #[error("Shared feed closed")]
    FeedClosed,
}

impl UpstreamError {
    /// Whether the relay should back off and try again
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            UpstreamError::Misconfigured(_) | UpstreamError::FeedClosed
        )
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else if err.is_builder() {
            UpstreamError::Misconfigured(err.to_string())
        } else if let Some(status) = err.status() {
            UpstreamError::Status(status.as_u16())
        } else if err.is_body() || err.is_decode() {
            UpstreamError::Body(err.to_string())
        } else {
            UpstreamError::Connect(err.to_string())
        }
    }
}

/// Relay session errors
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Session not found: {0}")]
    SessionNotFound(uuid::Uuid),

    #[error("Downstream disconnected")]
    DownstreamDisconnected,
}

/// Telemetry storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage task failed: {0}")]
    TaskFailed(String),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
