//! Error taxonomy for gateway calls.

use thiserror::Error;

/// Result type for gateway operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while talking to the gateway.
///
/// Business failures carry the gateway's description verbatim.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Credential or session failure. Never retried.
    #[error("{0}")]
    Auth(String),

    /// The caller lacks rights on an object or field.
    #[error("{0}")]
    Permission(String),

    /// Timeout or temporary unavailability. Retried with backoff.
    #[error("{0}")]
    Transient(String),

    /// Unclassified business failure, or a response that is not well-formed
    /// XML (message prefixed with `malformed XML:`).
    #[error("{0}")]
    Protocol(String),

    /// The control block was rejected (sender credentials, DTD version).
    #[error("{0}")]
    Config(String),

    /// Non-retryable HTTP status.
    #[error("HTTP {status} for {function}: {body}")]
    Http {
        status: u16,
        function: String,
        body: String,
    },

    /// Transport-level failure from the HTTP client.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ClientError {
    /// Returns true if the call may succeed when repeated.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transient(_) => true,
            ClientError::Transport(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() || e.is_decode()
            }
            _ => false,
        }
    }

    /// Returns true for credential and control-block failures.
    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Auth(_) | ClientError::Config(_))
    }

    /// Returns true if the caller lacks rights on the requested object.
    pub fn is_permission(&self) -> bool {
        matches!(self, ClientError::Permission(_))
    }
}
