//! Messages emitted by the source and the sink they are written to.

use crate::catalog::Catalog;
use crate::error::{SyncError, SyncResult};
use crate::state::StreamState;
use async_trait::async_trait;
use intacct_types::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// A single record of a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMessage {
    pub stream: String,
    pub data: Record,
    /// Milliseconds since the Unix epoch.
    pub emitted_at: i64,
}

/// Names the stream a checkpoint belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub name: String,
}

/// Checkpoint payload for one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStatePayload {
    pub stream_descriptor: StreamDescriptor,
    pub stream_state: StreamState,
}

/// Kind of state message; only per-stream state is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateType {
    Stream,
}

/// A state checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMessage {
    #[serde(rename = "type")]
    pub state_type: StateType,
    pub stream: StreamStatePayload,
}

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// A log line forwarded to the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    pub level: LogLevel,
    pub message: String,
}

/// Outcome of a connection check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Succeeded,
    Failed,
}

/// Connection check result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ConnectionStatus {
    /// A successful check.
    pub fn succeeded() -> Self {
        Self {
            status: Status::Succeeded,
            message: None,
        }
    }

    /// A failed check carrying the underlying description.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            message: Some(message.into()),
        }
    }

    /// Returns true if the check passed.
    pub fn is_success(&self) -> bool {
        self.status == Status::Succeeded
    }
}

/// Everything the source writes to its consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceMessage {
    Record { record: RecordMessage },
    State { state: StateMessage },
    Log { log: LogMessage },
    Catalog { catalog: Catalog },
    ConnectionStatus {
        #[serde(rename = "connectionStatus")]
        connection_status: ConnectionStatus,
    },
    Spec { spec: Value },
}

impl SourceMessage {
    /// Wraps a record, stamping the emission time.
    pub fn record(stream: &str, data: Record) -> Self {
        SourceMessage::Record {
            record: RecordMessage {
                stream: stream.to_string(),
                data,
                emitted_at: chrono::Utc::now().timestamp_millis(),
            },
        }
    }

    /// Wraps a stream checkpoint.
    pub fn state(stream: &str, stream_state: StreamState) -> Self {
        SourceMessage::State {
            state: StateMessage {
                state_type: StateType::Stream,
                stream: StreamStatePayload {
                    stream_descriptor: StreamDescriptor {
                        name: stream.to_string(),
                    },
                    stream_state,
                },
            },
        }
    }

    /// Wraps a log line.
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        SourceMessage::Log {
            log: LogMessage {
                level,
                message: message.into(),
            },
        }
    }

    /// Serializes the message as one JSON line (without the newline).
    pub fn to_json_line(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Destination for emitted messages.
///
/// The engine awaits each `send` before moving on, so a checkpoint is only
/// sent once every record before it has been accepted.
#[async_trait]
pub trait MessageSink: Send {
    async fn send(&mut self, message: SourceMessage) -> SyncResult<()>;
}

#[async_trait]
impl MessageSink for Vec<SourceMessage> {
    async fn send(&mut self, message: SourceMessage) -> SyncResult<()> {
        self.push(message);
        Ok(())
    }
}

#[async_trait]
impl MessageSink for mpsc::Sender<SourceMessage> {
    async fn send(&mut self, message: SourceMessage) -> SyncResult<()> {
        mpsc::Sender::send(self, message)
            .await
            .map_err(|e| SyncError::Sink(e.to_string()))
    }
}
