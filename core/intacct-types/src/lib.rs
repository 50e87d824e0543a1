//! Core type definitions for the Sage Intacct source.
//!
//! This crate defines the small, transport-agnostic types shared by the
//! protocol client and the sync engine:
//! - Entity identifiers (organizational sub-scopes)
//! - Modification watermarks and the gateway's date-time formats
//! - Flat records and the flattening transform

mod ids;
mod record;
mod timestamp;

pub use ids::{EntityId, ROOT_STATE_KEY, state_key};
pub use record::{FLATTEN_SEPARATOR, Record, flatten_record};
pub use timestamp::{
    QUERY_DATETIME_FORMAT, Watermark, format_query_datetime, normalize_timestamp, parse_timestamp,
};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
