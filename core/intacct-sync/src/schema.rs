//! Best-effort JSON schema inference for discovery.

use crate::catalog::StreamDefinition;
use crate::engine::{UNFILTERED_QUERY, prepare_record};
use crate::error::SyncResult;
use crate::executor::{QueryExecutor, QuerySpec};
use intacct_client::IntacctApi;
use intacct_types::EntityId;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// The broad type a field is published as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Number,
    Boolean,
    String,
    Array,
}

impl FieldType {
    /// Nullable JSON schema for this type.
    pub fn to_schema(self) -> Value {
        let name = match self {
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::String => "string",
            FieldType::Array => "array",
        };
        json!({"type": [name, "null"]})
    }
}

/// Classifies a declared type name.
///
/// Date and time types stay textual so values are never coerced.
pub fn classify_type(declared: &str) -> FieldType {
    let lowered = declared.to_lowercase();
    if ["int", "number", "decimal"]
        .iter()
        .any(|hint| lowered.contains(hint))
    {
        FieldType::Number
    } else if lowered.contains("date") || lowered.contains("time") {
        FieldType::String
    } else if lowered.contains("bool") {
        FieldType::Boolean
    } else {
        FieldType::String
    }
}

fn classify_value(value: &Value) -> Option<FieldType> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some(FieldType::Boolean),
        Value::Number(_) => Some(FieldType::Number),
        Value::Array(_) => Some(FieldType::Array),
        Value::String(_) | Value::Object(_) => Some(FieldType::String),
    }
}

/// Collects `(NAME, DATATYPE | TYPE)` pairs anywhere in a lookup result.
pub fn lookup_fields(lookup: &Value) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    walk_lookup(lookup, &mut fields);
    fields
}

fn walk_lookup(node: &Value, fields: &mut BTreeMap<String, String>) {
    match node {
        Value::Object(map) => {
            if let Some(Value::String(name)) = map.get("NAME") {
                if !name.is_empty() {
                    let declared = ["DATATYPE", "TYPE"]
                        .iter()
                        .find_map(|k| map.get(*k).and_then(Value::as_str))
                        .unwrap_or_default();
                    fields
                        .entry(name.clone())
                        .or_insert_with(|| declared.to_string());
                }
            }
            for child in map.values() {
                walk_lookup(child, fields);
            }
        }
        Value::Array(list) => {
            for child in list {
                walk_lookup(child, fields);
            }
        }
        _ => {}
    }
}

/// Infers stream schemas from sampled records and object metadata.
pub struct SchemaInference<'a> {
    api: &'a dyn IntacctApi,
    sample_size: u32,
}

impl<'a> SchemaInference<'a> {
    /// Creates an inference helper.
    pub fn new(api: &'a dyn IntacctApi, sample_size: u32) -> Self {
        Self {
            api,
            sample_size: sample_size.max(1),
        }
    }

    /// Schema for a stream; falls back to the fixed-field schema on any
    /// failure.
    pub async fn infer(&self, definition: &StreamDefinition, entity: Option<&EntityId>) -> Value {
        match self.try_infer(definition, entity).await {
            Ok(schema) => schema,
            Err(e) => {
                warn!(
                    "Schema inference failed for {}, using base schema: {}",
                    definition.name, e
                );
                definition.base_schema()
            }
        }
    }

    async fn try_infer(
        &self,
        definition: &StreamDefinition,
        entity: Option<&EntityId>,
    ) -> SyncResult<Value> {
        let query = match &definition.static_filter {
            Some(filter) => filter.clone(),
            None => UNFILTERED_QUERY.to_string(),
        };
        let spec = QuerySpec::all_fields(definition.object.as_str(), query);
        let page = QueryExecutor::new(self.api, self.sample_size)
            .query(spec, entity)
            .next_page()
            .await?
            .unwrap_or_default();

        let mut properties: Map<String, Value> = Map::new();
        for record in page.records {
            for (field, value) in prepare_record(record, entity) {
                if properties.contains_key(&field) {
                    continue;
                }
                if let Some(kind) = classify_value(&value) {
                    properties.insert(field, kind.to_schema());
                }
            }
        }

        let lookup = self.api.lookup(&definition.object, entity).await?;
        for (field, declared) in lookup_fields(&Value::Object(lookup)) {
            properties
                .entry(field)
                .or_insert_with(|| classify_type(&declared).to_schema());
        }

        if let Value::Object(base) = definition.base_schema() {
            if let Some(Value::Object(fixed)) = base.get("properties") {
                for (field, schema) in fixed {
                    properties.insert(field.clone(), schema.clone());
                }
            }
        }
        debug!(
            stream = %definition.name,
            fields = properties.len(),
            "Inferred schema"
        );

        Ok(json!({
            "type": "object",
            "properties": properties,
            "additionalProperties": true,
        }))
    }
}

