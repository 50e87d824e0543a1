//! Stream catalog: which objects are synced and how.

use crate::config::SourceConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Record identifier field.
pub const PRIMARY_KEY: &str = "RECORDNO";
/// Modification-time cursor field.
pub const CURSOR_FIELD: &str = "WHENMODIFIED";
/// Field stamped on every record with the entity it was read under.
pub const ENTITY_FIELD: &str = "entity_id";

/// How a stream is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Every record on every run.
    FullRefresh,
    /// Only records modified since the stored cursor.
    Incremental,
}

/// A child object whose modification time cannot be filtered on, and the
/// parent it is read through instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentFallback {
    /// Object whose queries reject the cursor filter.
    pub child: &'static str,
    /// Object that embeds the child collection.
    pub parent: &'static str,
    /// Field stamped on each extracted child with the parent's key.
    pub parent_key_field: &'static str,
}

/// Objects known to need the parent read path.
pub const PARENT_FALLBACKS: &[ParentFallback] = &[ParentFallback {
    child: "ARINVOICEITEM",
    parent: "ARINVOICE",
    parent_key_field: "INVOICE_RECORDNO",
}];

/// Looks up the fallback for an object.
pub fn parent_fallback(object: &str) -> Option<&'static ParentFallback> {
    PARENT_FALLBACKS.iter().find(|f| f.child == object)
}

/// One stream in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDefinition {
    /// Stream name as exposed to consumers.
    pub name: String,
    /// Gateway object queried.
    pub object: String,
    /// Whether the stream supports cursor-driven reads.
    pub incremental: bool,
    /// Clause ANDed into every query of this stream.
    pub static_filter: Option<String>,
}

impl StreamDefinition {
    /// A stream with no static filter.
    pub fn new(name: &str, object: &str, incremental: bool) -> Self {
        Self {
            name: name.to_string(),
            object: object.to_string(),
            incremental,
            static_filter: None,
        }
    }

    /// Adds a static filter.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.static_filter = Some(filter.into());
        self
    }

    /// Supported sync modes, full refresh first.
    pub fn sync_modes(&self) -> Vec<SyncMode> {
        if self.incremental {
            vec![SyncMode::FullRefresh, SyncMode::Incremental]
        } else {
            vec![SyncMode::FullRefresh]
        }
    }

    /// Fallback route for this stream's object, if it has one.
    pub fn fallback(&self) -> Option<&'static ParentFallback> {
        parent_fallback(&self.object)
    }

    /// Schema used when nothing better can be inferred.
    pub fn base_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                ENTITY_FIELD: {"type": ["string", "null"]},
                PRIMARY_KEY: {"type": ["string", "integer", "null"]},
                CURSOR_FIELD: {"type": ["string", "null"]},
            },
            "additionalProperties": true,
        })
    }
}

/// Builds a document-type filter, doubling embedded quotes.
pub fn docparid_filter(docparid: &str) -> String {
    format!("DOCPARID = '{}'", docparid.replace('\'', "''"))
}

/// Every stream the source offers, in catalog order.
pub fn build_streams(config: &SourceConfig) -> Vec<StreamDefinition> {
    let invoice = docparid_filter(&config.oe_invoice_docparid);
    let order = docparid_filter(&config.oe_order_docparid);

    vec![
        StreamDefinition::new("gl_journals", "GLJOURNAL", false),
        StreamDefinition::new("gl_batches", "GLBATCH", true),
        StreamDefinition::new("gl_entries", "GLENTRY", true),
        StreamDefinition::new("gl_detail", "GLDETAIL", true),
        StreamDefinition::new("customers", "CUSTOMER", true),
        StreamDefinition::new("ar_invoices", "ARINVOICE", true),
        StreamDefinition::new("ar_invoice_items", "ARINVOICEITEM", true),
        StreamDefinition::new("oe_invoices", "SODOCUMENT", true).with_filter(invoice.clone()),
        StreamDefinition::new("oe_invoice_lines", "SODOCUMENTENTRY", true)
            .with_filter(invoice.clone()),
        StreamDefinition::new("orders", "SODOCUMENT", true).with_filter(order.clone()),
        StreamDefinition::new("order_lines", "SODOCUMENTENTRY", true).with_filter(order.clone()),
        StreamDefinition::new("subtotals", "SODOCUMENTSUBTOTALS", true).with_filter(invoice),
        StreamDefinition::new("so_subtotals", "SODOCUMENTSUBTOTALS", true).with_filter(order),
    ]
}

/// A stream as advertised by discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogStream {
    pub name: String,
    pub json_schema: Value,
    pub supported_sync_modes: Vec<SyncMode>,
    #[serde(default)]
    pub source_defined_cursor: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_cursor_field: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_defined_primary_key: Vec<Vec<String>>,
}

impl CatalogStream {
    /// Advertises a stream with the given schema.
    pub fn from_definition(definition: &StreamDefinition, json_schema: Value) -> Self {
        Self {
            name: definition.name.clone(),
            json_schema,
            supported_sync_modes: definition.sync_modes(),
            source_defined_cursor: definition.incremental,
            default_cursor_field: if definition.incremental {
                vec![CURSOR_FIELD.to_string()]
            } else {
                Vec::new()
            },
            source_defined_primary_key: vec![vec![PRIMARY_KEY.to_string()]],
        }
    }
}

/// Discovery output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub streams: Vec<CatalogStream>,
}

/// Reference to a stream inside a configured catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRef {
    pub name: String,
}

/// A stream the caller asked to read, and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfiguredStream {
    pub stream: StreamRef,
    pub sync_mode: SyncMode,
}

impl ConfiguredStream {
    /// Creates a configured stream.
    pub fn new(name: impl Into<String>, sync_mode: SyncMode) -> Self {
        Self {
            stream: StreamRef { name: name.into() },
            sync_mode,
        }
    }
}

/// The streams selected for a read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfiguredCatalog {
    pub streams: Vec<ConfiguredStream>,
}

impl ConfiguredCatalog {
    /// Selects every stream in its most capable mode.
    pub fn all(definitions: &[StreamDefinition]) -> Self {
        let streams = definitions
            .iter()
            .map(|d| {
                let mode = if d.incremental {
                    SyncMode::Incremental
                } else {
                    SyncMode::FullRefresh
                };
                ConfiguredStream::new(d.name.clone(), mode)
            })
            .collect();
        Self { streams }
    }
}
