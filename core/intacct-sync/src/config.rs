//! Source configuration.
//!
//! The configuration is deserialized once at startup with every default
//! applied here; nothing downstream fills in missing values.

use crate::error::{SyncError, SyncResult};
use chrono::Utc;
use intacct_client::{ClientConfig, Credentials, DEFAULT_API_URL, RetryConfig};
use intacct_types::{EntityId, Watermark};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Duration;

/// How the entities to iterate are chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntitiesMode {
    /// Discover every accessible entity.
    #[default]
    All,
    /// Use the configured `entity_ids`.
    Selected,
}

/// Immutable source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub sender_id: String,
    pub sender_password: String,
    pub user_id: String,
    pub company_id: String,
    pub user_password: String,

    /// Gateway endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Earliest modification time ever requested.
    #[serde(default = "default_start_date")]
    pub start_date: Watermark,
    /// Trailing window re-scanned before the last cursor.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    /// Records per query page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Width of one incremental time slice.
    #[serde(default = "default_slice_step_days")]
    pub slice_step_days: u32,
    /// Records sampled per stream during discovery.
    #[serde(default = "default_schema_sample_size")]
    pub schema_sample_size: u32,
    #[serde(default)]
    pub entities_mode: EntitiesMode,
    #[serde(default)]
    pub entity_ids: Vec<EntityId>,
    /// Document type of order-entry invoices.
    #[serde(default = "default_invoice_docparid")]
    pub oe_invoice_docparid: String,
    /// Document type of order-entry sales orders.
    #[serde(default = "default_order_docparid")]
    pub oe_order_docparid: String,
    /// Extra filter clause per object, ANDed into every query.
    #[serde(default)]
    pub query_overrides: BTreeMap<String, String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_start_date() -> Watermark {
    Watermark::new(Utc::now() - chrono::Duration::days(30))
}

fn default_lookback_days() -> u32 {
    3
}

fn default_page_size() -> u32 {
    1000
}

fn default_slice_step_days() -> u32 {
    7
}

fn default_schema_sample_size() -> u32 {
    200
}

fn default_invoice_docparid() -> String {
    "Sales Invoice".to_string()
}

fn default_order_docparid() -> String {
    "Sales Order".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl SourceConfig {
    /// Builds the configuration from raw JSON and validates it.
    pub fn from_value(value: Value) -> SyncResult<Self> {
        let config: Self =
            serde_json::from_value(value).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the engine cannot work with.
    pub fn validate(&self) -> SyncResult<()> {
        if self.page_size == 0 {
            return Err(SyncError::Config("page_size must be positive".to_string()));
        }
        if self.slice_step_days == 0 {
            return Err(SyncError::Config(
                "slice_step_days must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Gateway client settings derived from this configuration.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(Credentials {
            sender_id: self.sender_id.clone(),
            sender_password: self.sender_password.clone(),
            user_id: self.user_id.clone(),
            company_id: self.company_id.clone(),
            user_password: self.user_password.clone(),
        })
        .with_api_url(self.api_url.clone())
        .with_timeout(Duration::from_secs(self.timeout_secs))
        .with_retry(RetryConfig::default())
    }

    /// Lookback window as a duration.
    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.lookback_days))
    }

    /// Slice width as a duration.
    pub fn slice_step(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.slice_step_days))
    }

    /// Extra filter configured for an object, if any.
    pub fn query_override(&self, object: &str) -> Option<&str> {
        self.query_overrides
            .get(object)
            .map(String::as_str)
            .filter(|clause| !clause.trim().is_empty())
    }
}

/// JSON schema describing the accepted configuration.
pub fn connection_specification() -> Value {
    json!({
        "documentationUrl": "https://developer.intacct.com/web-services/",
        "connectionSpecification": {
            "$schema": "http://json-schema.org/draft-07/schema#",
            "title": "Sage Intacct Source Spec",
            "type": "object",
            "required": ["sender_id", "sender_password", "user_id", "company_id", "user_password"],
            "additionalProperties": true,
            "properties": {
                "sender_id": {"type": "string", "title": "Sender ID"},
                "sender_password": {"type": "string", "title": "Sender Password", "airbyte_secret": true},
                "user_id": {"type": "string", "title": "User ID"},
                "company_id": {"type": "string", "title": "Company ID"},
                "user_password": {"type": "string", "title": "User Password", "airbyte_secret": true},
                "api_url": {"type": "string", "default": DEFAULT_API_URL},
                "start_date": {"type": "string", "format": "date-time"},
                "lookback_days": {"type": "integer", "minimum": 0, "default": 3},
                "page_size": {"type": "integer", "minimum": 1, "maximum": 2000, "default": 1000},
                "slice_step_days": {"type": "integer", "minimum": 1, "default": 7},
                "schema_sample_size": {"type": "integer", "minimum": 1, "default": 200},
                "entities_mode": {"type": "string", "enum": ["all", "selected"], "default": "all"},
                "entity_ids": {"type": "array", "items": {"type": "string"}, "default": []},
                "oe_invoice_docparid": {"type": "string", "default": "Sales Invoice"},
                "oe_order_docparid": {"type": "string", "default": "Sales Order"},
                "query_overrides": {"type": "object", "additionalProperties": {"type": "string"}},
                "timeout_secs": {"type": "integer", "minimum": 1, "default": 60}
            }
        },
        "supportsIncremental": true
    })
}
