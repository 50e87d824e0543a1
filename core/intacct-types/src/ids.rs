//! Identifier types for organizational sub-scopes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State key used for streams synced without an entity override.
pub const ROOT_STATE_KEY: &str = "_root";

/// Identifier of an Intacct entity (location / sub-ledger).
///
/// Entities are opaque strings assigned by the remote company; ordering is
/// lexical so discovery results can be sorted deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Creates an entity ID from its remote identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Returns the key under which cursor state for `entity` is persisted.
#[must_use]
pub fn state_key(entity: Option<&EntityId>) -> &str {
    entity.map_or(ROOT_STATE_KEY, EntityId::as_str)
}
