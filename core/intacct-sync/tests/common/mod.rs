//! Shared test helpers for sync tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use intacct_client::{ClientError, ClientResult, IntacctApi, QueryResult};
use intacct_sync::SourceConfig;
use intacct_types::{EntityId, Record};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;

/// A gateway call as seen by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    EntityDetails,
    Lookup {
        object: String,
        entity: Option<String>,
    },
    Query {
        object: String,
        fields: Vec<String>,
        query: String,
        page_size: u32,
        entity: Option<String>,
    },
    ReadMore {
        result_id: String,
        entity: Option<String>,
    },
    Read {
        object: String,
        keys: Vec<String>,
        entity: Option<String>,
    },
}

type QueryHandler = dyn Fn(&str, &str, Option<&EntityId>) -> ClientResult<QueryResult> + Send + Sync;
type ErrorFactory = dyn Fn() -> ClientError + Send + Sync;

/// Scripted in-memory gateway.
pub struct FakeApi {
    entities: Vec<EntityId>,
    entity_error: Option<Box<ErrorFactory>>,
    query: Box<QueryHandler>,
    continuations: HashMap<String, QueryResult>,
    full_records: HashMap<(String, String), Vec<Record>>,
    lookups: HashMap<String, Record>,
    lookup_error: Option<Box<ErrorFactory>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            entity_error: None,
            query: Box::new(|_, _, _| Ok(QueryResult::default())),
            continuations: HashMap::new(),
            full_records: HashMap::new(),
            lookups: HashMap::new(),
            lookup_error: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_entities(mut self, ids: &[&str]) -> Self {
        self.entities = ids.iter().map(|id| EntityId::new(*id)).collect();
        self
    }

    pub fn failing_entities(
        mut self,
        error: impl Fn() -> ClientError + Send + Sync + 'static,
    ) -> Self {
        self.entity_error = Some(Box::new(error));
        self
    }

    pub fn on_query(
        mut self,
        handler: impl Fn(&str, &str, Option<&EntityId>) -> ClientResult<QueryResult>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.query = Box::new(handler);
        self
    }

    pub fn with_continuation(mut self, result_id: &str, page: QueryResult) -> Self {
        self.continuations.insert(result_id.to_string(), page);
        self
    }

    pub fn with_full_record(mut self, object: &str, key: &str, record: Record) -> Self {
        self.full_records
            .entry((object.to_string(), key.to_string()))
            .or_default()
            .push(record);
        self
    }

    pub fn with_lookup(mut self, object: &str, lookup: Record) -> Self {
        self.lookups.insert(object.to_string(), lookup);
        self
    }

    pub fn failing_lookups(
        mut self,
        error: impl Fn() -> ClientError + Send + Sync + 'static,
    ) -> Self {
        self.lookup_error = Some(Box::new(error));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Query { object, query, .. } => Some((object, query)),
                _ => None,
            })
            .collect()
    }

    fn record_call(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn label(entity: Option<&EntityId>) -> Option<String> {
    entity.map(|e| e.as_str().to_string())
}

#[async_trait]
impl IntacctApi for FakeApi {
    async fn read_entity_details(&self) -> ClientResult<Vec<EntityId>> {
        self.record_call(Call::EntityDetails);
        match &self.entity_error {
            Some(error) => Err(error()),
            None => Ok(self.entities.clone()),
        }
    }

    async fn lookup(&self, object: &str, entity: Option<&EntityId>) -> ClientResult<Record> {
        self.record_call(Call::Lookup {
            object: object.to_string(),
            entity: label(entity),
        });
        if let Some(error) = &self.lookup_error {
            return Err(error());
        }
        Ok(self.lookups.get(object).cloned().unwrap_or_default())
    }

    async fn read_by_query(
        &self,
        object: &str,
        fields: &[&str],
        query: &str,
        page_size: u32,
        entity: Option<&EntityId>,
    ) -> ClientResult<QueryResult> {
        self.record_call(Call::Query {
            object: object.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            query: query.to_string(),
            page_size,
            entity: label(entity),
        });
        (self.query)(object, query, entity)
    }

    async fn read_more(
        &self,
        result_id: &str,
        entity: Option<&EntityId>,
    ) -> ClientResult<QueryResult> {
        self.record_call(Call::ReadMore {
            result_id: result_id.to_string(),
            entity: label(entity),
        });
        self.continuations
            .get(result_id)
            .cloned()
            .ok_or_else(|| ClientError::Protocol(format!("unknown result id {result_id}")))
    }

    async fn read(
        &self,
        object: &str,
        keys: &[&str],
        _fields: &[&str],
        entity: Option<&EntityId>,
    ) -> ClientResult<Vec<Record>> {
        self.record_call(Call::Read {
            object: object.to_string(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
            entity: label(entity),
        });
        let mut out = Vec::new();
        for key in keys {
            if let Some(records) = self.full_records.get(&(object.to_string(), key.to_string())) {
                out.extend(records.iter().cloned());
            }
        }
        Ok(out)
    }
}

/// Converts a JSON object literal into a record.
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

/// A page with continuation metadata.
pub fn page(records: Vec<Record>, result_id: Option<&str>, num_remaining: u64) -> QueryResult {
    QueryResult {
        records,
        result_id: result_id.map(str::to_string),
        num_remaining,
    }
}

/// A final page.
pub fn last_page(records: Vec<Record>) -> QueryResult {
    page(records, None, 0)
}

/// UTC instant helper.
pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

/// Baseline configuration with credentials filled in.
pub fn base_config_json() -> Value {
    json!({
        "sender_id": "sender",
        "sender_password": "sender-pass",
        "user_id": "user",
        "company_id": "company",
        "user_password": "user-pass",
        "start_date": "2024-01-01T00:00:00Z",
    })
}

/// Baseline configuration with the given fields overridden.
pub fn config_with(overrides: Value) -> SourceConfig {
    let mut raw = base_config_json();
    if let (Value::Object(base), Value::Object(extra)) = (&mut raw, overrides) {
        for (key, value) in extra {
            base.insert(key, value);
        }
    }
    SourceConfig::from_value(raw).unwrap()
}

/// Baseline configuration.
pub fn config() -> SourceConfig {
    config_with(json!({}))
}
