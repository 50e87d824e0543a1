//! Command handlers for the Sage Intacct connector.
//!
//! Every command writes newline-delimited JSON messages to the given
//! writer. Diagnostics go through `tracing`, never to the message stream.

use anyhow::{Context, Result};
use async_trait::async_trait;
use intacct_sync::message::ConnectionStatus;
use intacct_sync::{
    ConfiguredCatalog, IntacctSource, MessageSink, ReadSummary, SourceConfig, SourceMessage,
    SourceState, SyncError, SyncResult, connection_specification,
};
use serde_json::Value;
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::info;

/// Writes each message as one JSON line and flushes it.
pub struct JsonLineSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> JsonLineSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> MessageSink for JsonLineSink<W> {
    async fn send(&mut self, message: SourceMessage) -> SyncResult<()> {
        let mut line = message.to_json_line()?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| SyncError::Sink(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| SyncError::Sink(e.to_string()))
    }
}

/// Reads a JSON document from disk.
pub async fn load_json(path: &Path) -> Result<Value> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Emits the connector specification.
pub async fn spec(sink: &mut dyn MessageSink) -> Result<()> {
    sink.send(SourceMessage::Spec {
        spec: connection_specification(),
    })
    .await?;
    Ok(())
}

/// Checks the connection. Invalid configuration is reported as a failed
/// status, not as an error.
pub async fn check(config: Value, sink: &mut dyn MessageSink) -> Result<()> {
    let status = match SourceConfig::from_value(config).and_then(IntacctSource::new) {
        Ok(source) => source.check().await,
        Err(e) => ConnectionStatus::failed(e.to_string()),
    };
    info!("Connection check finished: {:?}", status.status);
    sink.send(SourceMessage::ConnectionStatus {
        connection_status: status,
    })
    .await?;
    Ok(())
}

/// Emits the discovered catalog.
pub async fn discover(config: Value, sink: &mut dyn MessageSink) -> Result<()> {
    let source = build_source(config)?;
    let catalog = source.discover().await;
    info!("Discovered {} streams", catalog.streams.len());
    sink.send(SourceMessage::Catalog { catalog }).await?;
    Ok(())
}

/// Reads the configured streams starting from the given state.
pub async fn read(
    config: Value,
    catalog: Value,
    state: Option<Value>,
    sink: &mut dyn MessageSink,
) -> Result<ReadSummary> {
    let source = build_source(config)?;
    let catalog: ConfiguredCatalog =
        serde_json::from_value(catalog).context("Invalid configured catalog")?;
    let state = SourceState::from_value(state.unwrap_or(Value::Null))
        .context("Invalid state")?;

    let summary = source
        .read(&catalog, &state, sink)
        .await
        .context("Read failed")?;
    Ok(summary)
}

fn build_source(config: Value) -> Result<IntacctSource> {
    let config = SourceConfig::from_value(config).context("Invalid configuration")?;
    IntacctSource::new(config).context("Failed to create gateway client")
}
