//! Entity resolution.

use crate::config::{EntitiesMode, SourceConfig};
use crate::error::{SyncError, SyncResult};
use intacct_client::IntacctApi;
use intacct_types::EntityId;
use tracing::{info, warn};

/// Decides which entities a sync iterates.
///
/// `None` in the resolved list stands for one unscoped pass.
#[derive(Debug, Clone)]
pub struct EntityResolver {
    mode: EntitiesMode,
    selected: Vec<EntityId>,
}

impl EntityResolver {
    /// Creates a resolver.
    pub fn new(mode: EntitiesMode, selected: Vec<EntityId>) -> Self {
        Self { mode, selected }
    }

    /// Creates a resolver from the source configuration.
    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(config.entities_mode, config.entity_ids.clone())
    }

    /// Returns the selection mode.
    pub fn mode(&self) -> EntitiesMode {
        self.mode
    }

    /// Resolves entities, falling back to an unscoped pass when none are
    /// found.
    pub async fn resolve(&self, api: &dyn IntacctApi) -> SyncResult<Vec<Option<EntityId>>> {
        let entities = self.resolve_ids(api).await?;
        if entities.is_empty() {
            warn!("No entities resolved, syncing without entity scope");
            return Ok(vec![None]);
        }
        Ok(entities.into_iter().map(Some).collect())
    }

    /// Resolves entities, treating empty discovery as a configuration
    /// failure.
    pub async fn resolve_strict(&self, api: &dyn IntacctApi) -> SyncResult<Vec<Option<EntityId>>> {
        let entities = self.resolve_ids(api).await?;
        if entities.is_empty() {
            return match self.mode {
                EntitiesMode::All => Err(SyncError::Config(
                    "No accessible entities returned by readEntityDetails.".to_string(),
                )),
                EntitiesMode::Selected => Ok(vec![None]),
            };
        }
        Ok(entities.into_iter().map(Some).collect())
    }

    async fn resolve_ids(&self, api: &dyn IntacctApi) -> SyncResult<Vec<EntityId>> {
        match self.mode {
            EntitiesMode::Selected => {
                let mut ids: Vec<EntityId> = Vec::new();
                for id in &self.selected {
                    if !id.as_str().is_empty() && !ids.contains(id) {
                        ids.push(id.clone());
                    }
                }
                Ok(ids)
            }
            EntitiesMode::All => {
                let mut ids = api.read_entity_details().await?;
                ids.sort();
                ids.dedup();
                info!("Discovered {} entities", ids.len());
                Ok(ids)
            }
        }
    }
}
