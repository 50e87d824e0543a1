//! Cursor state persisted between runs.
//!
//! Each stream keeps one watermark per entity. The serialized shape is
//! `{"entities": {"<entity or _root>": {"cursor": "<RFC 3339>"}}}`.

use crate::error::{SyncError, SyncResult};
use intacct_types::{EntityId, Watermark, state_key};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Cursor for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCursor {
    pub cursor: Watermark,
}

/// Cursor state for one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamState {
    #[serde(default)]
    pub entities: BTreeMap<String, EntityCursor>,
}

impl StreamState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored watermark for an entity.
    pub fn cursor(&self, entity: Option<&EntityId>) -> Option<Watermark> {
        self.entities.get(state_key(entity)).map(|c| c.cursor)
    }

    /// Merges an observed watermark, keeping the stored one if it is newer.
    ///
    /// Returns true if the stored watermark advanced.
    pub fn observe(&mut self, entity: Option<&EntityId>, candidate: Watermark) -> bool {
        let key = state_key(entity);
        match self.entities.get_mut(key) {
            Some(existing) if existing.cursor >= candidate => false,
            Some(existing) => {
                existing.cursor = candidate;
                true
            }
            None => {
                self.entities
                    .insert(key.to_string(), EntityCursor { cursor: candidate });
                true
            }
        }
    }

    /// Returns true if no entity has a cursor yet.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Cursor state for every stream, keyed by stream name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceState {
    streams: BTreeMap<String, StreamState>,
}

impl SourceState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads state in either of the accepted shapes.
    ///
    /// - a mapping of stream name to stream state
    /// - a list of per-stream state messages
    ///   (`{"type": "STREAM", "stream": {"stream_descriptor": {"name": ..},
    ///   "stream_state": {..}}}`)
    ///
    /// Entries without a name or state are skipped.
    pub fn from_value(value: Value) -> SyncResult<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Array(messages) => {
                let mut state = Self::default();
                for message in messages {
                    let stream = &message["stream"];
                    let Some(name) = stream["stream_descriptor"]["name"].as_str() else {
                        continue;
                    };
                    let data = &stream["stream_state"];
                    if !data.is_object() {
                        continue;
                    }
                    let parsed: StreamState = serde_json::from_value(data.clone())
                        .map_err(|e| SyncError::State(format!("stream {name}: {e}")))?;
                    state.streams.insert(name.to_string(), parsed);
                }
                Ok(state)
            }
            Value::Object(_) => {
                serde_json::from_value(value).map_err(|e| SyncError::State(e.to_string()))
            }
            other => Err(SyncError::State(format!("unexpected state value: {other}"))),
        }
    }

    /// State for one stream, empty if none was stored.
    pub fn stream(&self, name: &str) -> StreamState {
        self.streams.get(name).cloned().unwrap_or_default()
    }

    /// Replaces the state of one stream.
    pub fn set_stream(&mut self, name: impl Into<String>, state: StreamState) {
        self.streams.insert(name.into(), state);
    }

    /// Names of streams with stored state.
    pub fn stream_names(&self) -> impl Iterator<Item = &str> {
        self.streams.keys().map(String::as_str)
    }
}
