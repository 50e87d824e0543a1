//! Incremental sync engine for the Sage Intacct source.
//!
//! This crate turns the gateway's query operations into record streams:
//! - Paged query execution with continuation tokens
//! - Entity resolution (selected ids or discovered entities)
//! - Time slicing with a lookback window over the last cursor
//! - Per-entity cursor state, checkpointed after every slice
//! - A parent read path for child objects that reject cursor filters
//! - Schema inference and the source facade (`check`, `discover`, `read`)
//!
//! # Example
//!
//! ```no_run
//! use intacct_sync::{ConfiguredCatalog, IntacctSource, SourceConfig, SourceMessage, SourceState};
//!
//! # async fn run(raw: serde_json::Value) -> intacct_sync::SyncResult<()> {
//! let config = SourceConfig::from_value(raw)?;
//! let source = IntacctSource::new(config)?;
//! let catalog = ConfiguredCatalog::all(source.streams());
//! let mut messages: Vec<SourceMessage> = Vec::new();
//! source.read(&catalog, &SourceState::new(), &mut messages).await?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
mod config;
mod engine;
mod entities;
mod error;
mod executor;
pub mod fallback;
pub mod message;
pub mod schema;
mod slicing;
mod source;
mod state;

pub use catalog::{
    CURSOR_FIELD, Catalog, CatalogStream, ConfiguredCatalog, ConfiguredStream, ENTITY_FIELD,
    PARENT_FALLBACKS, PRIMARY_KEY, ParentFallback, StreamDefinition, SyncMode, build_streams,
};
pub use config::{EntitiesMode, SourceConfig, connection_specification};
pub use engine::{EntityPhase, StreamReader, UNFILTERED_QUERY, prepare_record};
pub use entities::EntityResolver;
pub use error::{SyncError, SyncResult};
pub use executor::{Page, Pager, QueryExecutor, QuerySpec};
pub use message::{ConnectionStatus, LogLevel, MessageSink, SourceMessage};
pub use slicing::{TimeSlice, compute_start, generate_slices};
pub use source::{IntacctSource, ReadSummary};
pub use state::{EntityCursor, SourceState, StreamState};
