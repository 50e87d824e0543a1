//! Source facade: connection check, discovery and read.

use crate::catalog::{
    Catalog, CatalogStream, ConfiguredCatalog, PRIMARY_KEY, StreamDefinition, SyncMode,
    build_streams,
};
use crate::config::SourceConfig;
use crate::engine::{StreamReader, UNFILTERED_QUERY};
use crate::entities::EntityResolver;
use crate::error::{SyncError, SyncResult};
use crate::message::{ConnectionStatus, LogLevel, MessageSink, SourceMessage};
use crate::schema::SchemaInference;
use crate::state::{SourceState, StreamState};
use chrono::{DateTime, Utc};
use intacct_client::{ClientError, IntacctApi, IntacctClient};
use intacct_types::EntityId;
use std::sync::Arc;
use tracing::{info, warn};

/// Objects probed in order until one can be queried.
const PROBE_OBJECTS: &[&str] = &["CUSTOMER", "ARINVOICE", "SODOCUMENT"];

/// Objects whose metadata must be readable for the order-entry streams.
const LOOKUP_OBJECTS: &[&str] = &["SODOCUMENT", "SODOCUMENTENTRY", "SODOCUMENTSUBTOTALS"];

/// Counts from one read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadSummary {
    /// Streams read to completion.
    pub streams_read: usize,
    /// Streams skipped because access was denied.
    pub streams_skipped: Vec<String>,
    /// Records emitted across all streams.
    pub records: usize,
}

/// The Sage Intacct source.
pub struct IntacctSource {
    config: SourceConfig,
    api: Arc<dyn IntacctApi>,
    streams: Vec<StreamDefinition>,
}

impl IntacctSource {
    /// Creates a source talking to the configured gateway.
    pub fn new(config: SourceConfig) -> SyncResult<Self> {
        let client = IntacctClient::new(config.client_config())?;
        Ok(Self::with_api(config, Arc::new(client)))
    }

    /// Creates a source on top of any gateway implementation.
    pub fn with_api(config: SourceConfig, api: Arc<dyn IntacctApi>) -> Self {
        let streams = build_streams(&config);
        Self {
            config,
            api,
            streams,
        }
    }

    /// The streams this source offers.
    pub fn streams(&self) -> &[StreamDefinition] {
        &self.streams
    }

    /// The configuration in use.
    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Verifies credentials and access to the core objects.
    ///
    /// Failures are reported in the returned status with the gateway's
    /// description, never as an error.
    pub async fn check(&self) -> ConnectionStatus {
        match self.run_check().await {
            Ok(()) => ConnectionStatus::succeeded(),
            Err(e) => {
                warn!("Connection check failed: {}", e);
                ConnectionStatus::failed(check_message(&e))
            }
        }
    }

    async fn run_check(&self) -> SyncResult<()> {
        let resolver = EntityResolver::from_config(&self.config);
        let entities = resolver.resolve_strict(self.api.as_ref()).await?;
        let probe_entity = entities.first().cloned().flatten();
        let probe_entity = probe_entity.as_ref();

        let mut denied: Option<ClientError> = None;
        for object in PROBE_OBJECTS {
            match self
                .api
                .read_by_query(object, &[PRIMARY_KEY], UNFILTERED_QUERY, 1, probe_entity)
                .await
            {
                Ok(_) => {
                    denied = None;
                    break;
                }
                Err(e) if e.is_permission() => {
                    info!("Probe of {} denied, trying next object", object);
                    denied = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }
        if let Some(e) = denied {
            return Err(e.into());
        }

        for object in LOOKUP_OBJECTS {
            self.api.lookup(object, probe_entity).await?;
        }
        Ok(())
    }

    /// Advertises every stream with an inferred schema.
    pub async fn discover(&self) -> Catalog {
        let resolver = EntityResolver::from_config(&self.config);
        let entity: Option<EntityId> = match resolver.resolve(self.api.as_ref()).await {
            Ok(entities) => entities.into_iter().next().flatten(),
            Err(e) => {
                warn!("Entity resolution failed during discovery: {}", e);
                None
            }
        };

        let inference = SchemaInference::new(self.api.as_ref(), self.config.schema_sample_size);
        let mut streams = Vec::with_capacity(self.streams.len());
        for definition in &self.streams {
            let schema = inference.infer(definition, entity.as_ref()).await;
            streams.push(CatalogStream::from_definition(definition, schema));
        }
        Catalog { streams }
    }

    /// Reads the configured streams, emitting records and checkpoints.
    ///
    /// A stream denied by permissions is skipped; any other failure aborts
    /// the read.
    pub async fn read(
        &self,
        catalog: &ConfiguredCatalog,
        state: &SourceState,
        sink: &mut dyn MessageSink,
    ) -> SyncResult<ReadSummary> {
        let entities = EntityResolver::from_config(&self.config)
            .resolve(self.api.as_ref())
            .await?;
        let now = Utc::now();
        let mut summary = ReadSummary::default();

        for configured in &catalog.streams {
            let name = &configured.stream.name;
            let Some(definition) = self.streams.iter().find(|d| &d.name == name) else {
                warn!("Skipping unknown stream {}", name);
                continue;
            };
            let incremental = definition.incremental && configured.sync_mode == SyncMode::Incremental;
            info!(
                "Reading stream {} ({})",
                name,
                if incremental { "incremental" } else { "full refresh" }
            );

            let mut stream_state = state.stream(name);
            let result = self
                .read_stream(definition, incremental, &entities, &mut stream_state, now, sink)
                .await;

            match result {
                Ok(count) => {
                    summary.streams_read += 1;
                    summary.records += count;
                }
                Err(e) if e.is_stream_scoped() => {
                    warn!("Skipping stream {} after permission error: {}", name, e);
                    sink.send(SourceMessage::log(
                        LogLevel::Warn,
                        format!("Skipping stream {name}: {e}"),
                    ))
                    .await?;
                    summary.streams_skipped.push(name.clone());
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "Read finished: {} streams, {} records, {} skipped",
            summary.streams_read,
            summary.records,
            summary.streams_skipped.len()
        );
        Ok(summary)
    }

    async fn read_stream(
        &self,
        definition: &StreamDefinition,
        incremental: bool,
        entities: &[Option<EntityId>],
        stream_state: &mut StreamState,
        now: DateTime<Utc>,
        sink: &mut dyn MessageSink,
    ) -> SyncResult<usize> {
        let mut reader = StreamReader::new(self.api.as_ref(), &self.config, definition);
        let mut total = 0;
        for entity in entities {
            total += if incremental {
                reader
                    .read_incremental(entity.as_ref(), stream_state, now, sink)
                    .await?
            } else {
                reader.read_full_refresh(entity.as_ref(), sink).await?
            };
        }
        Ok(total)
    }
}

/// The description surfaced for a failed check.
fn check_message(error: &SyncError) -> String {
    match error {
        SyncError::Config(message) => message.clone(),
        other => other.to_string(),
    }
}
