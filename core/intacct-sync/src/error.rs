//! Error types for the sync layer.

use intacct_client::ClientError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while syncing streams.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Gateway failure, surfaced with its original description.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Configuration rejected before or during a sync.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Persisted state could not be interpreted.
    #[error("invalid state: {0}")]
    State(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The consumer of emitted messages went away.
    #[error("message sink closed: {0}")]
    Sink(String),
}

impl SyncError {
    /// Returns true if the error only affects the stream that raised it.
    pub fn is_stream_scoped(&self) -> bool {
        matches!(self, SyncError::Client(e) if e.is_permission())
    }
}
