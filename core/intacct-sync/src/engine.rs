//! Incremental sync engine.
//!
//! Each (stream, entity) pair walks an explicit phase machine:
//! `Initial → Slicing → Paginating → Checkpointed → … → Done`.
//! Records of a slice are handed to the sink before that slice's checkpoint,
//! and the stored cursor only ever moves forward.

use crate::catalog::{CURSOR_FIELD, ENTITY_FIELD, PRIMARY_KEY, ParentFallback, StreamDefinition};
use crate::config::SourceConfig;
use crate::error::{SyncError, SyncResult};
use crate::executor::{QueryExecutor, QuerySpec};
use crate::fallback::{extract_child_items, is_unsupported_cursor_error};
use crate::message::{MessageSink, SourceMessage};
use crate::slicing::{TimeSlice, compute_start, generate_slices};
use crate::state::StreamState;
use chrono::{DateTime, Utc};
use intacct_client::IntacctApi;
use intacct_types::{
    EntityId, FLATTEN_SEPARATOR, Record, Watermark, flatten_record, normalize_timestamp,
};
use serde_json::Value;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Query used when a read has no filter at all.
pub const UNFILTERED_QUERY: &str = "RECORDNO > 0";

/// Where one entity's incremental read stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityPhase {
    /// Nothing planned yet.
    Initial,
    /// Slices planned; the next one has not started.
    Slicing { pending: VecDeque<TimeSlice> },
    /// A slice is being paged through.
    Paginating {
        slice: TimeSlice,
        pending: VecDeque<TimeSlice>,
    },
    /// A slice has drained and its cursor has been committed.
    Checkpointed {
        slice: TimeSlice,
        pending: VecDeque<TimeSlice>,
        observed: Option<Watermark>,
    },
    /// Every slice has been checkpointed.
    Done,
}

impl EntityPhase {
    /// Plans the slices of a read. An empty plan finishes immediately.
    pub fn plan(self, slices: Vec<TimeSlice>) -> Self {
        match self {
            EntityPhase::Initial if slices.is_empty() => EntityPhase::Done,
            EntityPhase::Initial => EntityPhase::Slicing {
                pending: slices.into(),
            },
            other => other,
        }
    }

    /// Starts the next slice, or finishes when none are left.
    pub fn next_slice(self) -> Self {
        match self {
            EntityPhase::Slicing { mut pending }
            | EntityPhase::Checkpointed { mut pending, .. } => match pending.pop_front() {
                Some(slice) => EntityPhase::Paginating { slice, pending },
                None => EntityPhase::Done,
            },
            other => other,
        }
    }

    /// Records that the current slice drained with the given maximum cursor.
    pub fn drained(self, observed: Option<Watermark>) -> Self {
        match self {
            EntityPhase::Paginating { slice, pending } => EntityPhase::Checkpointed {
                slice,
                pending,
                observed,
            },
            other => other,
        }
    }

    /// The slice being read or just checkpointed.
    pub fn current_slice(&self) -> Option<TimeSlice> {
        match self {
            EntityPhase::Paginating { slice, .. } | EntityPhase::Checkpointed { slice, .. } => {
                Some(*slice)
            }
            _ => None,
        }
    }

    /// Returns true once every slice has been handled.
    pub fn is_done(&self) -> bool {
        matches!(self, EntityPhase::Done)
    }
}

/// Reads one stream, entity by entity.
///
/// A reader lives for one stream within one run. Once the parent read path
/// has been taken it stays in use for the rest of the run.
pub struct StreamReader<'a> {
    executor: QueryExecutor<'a>,
    config: &'a SourceConfig,
    definition: &'a StreamDefinition,
    via_parent: bool,
}

impl<'a> StreamReader<'a> {
    /// Creates a reader for a stream.
    pub fn new(
        api: &'a dyn IntacctApi,
        config: &'a SourceConfig,
        definition: &'a StreamDefinition,
    ) -> Self {
        Self {
            executor: QueryExecutor::new(api, config.page_size),
            config,
            definition,
            via_parent: false,
        }
    }

    /// Returns true once the stream has switched to the parent read path.
    pub fn is_reading_via_parent(&self) -> bool {
        self.via_parent
    }

    /// Builds the query for a slice, or the unfiltered query without one.
    pub fn build_query(&self, slice: Option<&TimeSlice>) -> String {
        let mut clauses: Vec<String> = Vec::new();
        if let Some(slice) = slice {
            clauses.extend(slice.filter_clauses(CURSOR_FIELD));
        }
        if let Some(filter) = &self.definition.static_filter {
            clauses.push(filter.clone());
        }
        if let Some(extra) = self.config.query_override(&self.definition.object) {
            clauses.push(extra.to_string());
        }
        if clauses.is_empty() {
            UNFILTERED_QUERY.to_string()
        } else {
            clauses.join(" AND ")
        }
    }

    /// Reads every record of one entity without a cursor.
    pub async fn read_full_refresh(
        &self,
        entity: Option<&EntityId>,
        sink: &mut dyn MessageSink,
    ) -> SyncResult<usize> {
        let spec = QuerySpec::all_fields(self.definition.object.as_str(), self.build_query(None));
        let mut pager = self.executor.query(spec, entity);
        let mut emitted = 0;
        while let Some(page) = pager.next_page().await? {
            for record in page.records {
                let record = prepare_record(record, entity);
                sink.send(SourceMessage::record(&self.definition.name, record))
                    .await?;
                emitted += 1;
            }
        }
        info!(
            "Read {} records from {} (entity {})",
            emitted,
            self.definition.name,
            entity_label(entity)
        );
        Ok(emitted)
    }

    /// Reads one entity incrementally up to `now`, checkpointing after every
    /// slice.
    pub async fn read_incremental(
        &mut self,
        entity: Option<&EntityId>,
        state: &mut StreamState,
        now: DateTime<Utc>,
        sink: &mut dyn MessageSink,
    ) -> SyncResult<usize> {
        let start = compute_start(
            self.config.start_date.as_datetime(),
            state.cursor(entity),
            self.config.lookback(),
        );
        let slices = generate_slices(start, now, self.config.slice_step());
        debug!(
            stream = %self.definition.name,
            entity = entity_label(entity),
            slices = slices.len(),
            %start,
            "Planned incremental read"
        );

        let mut emitted = 0;
        let mut phase = EntityPhase::Initial.plan(slices).next_slice();
        while let EntityPhase::Paginating { slice, .. } = &phase {
            let slice = *slice;
            let mut observed = None;
            emitted += self.read_slice(entity, &slice, &mut observed, sink).await?;

            phase = phase.drained(observed);
            if let Some(watermark) = observed {
                state.observe(entity, watermark);
            }
            sink.send(SourceMessage::state(&self.definition.name, state.clone()))
                .await?;
            phase = phase.next_slice();
        }

        info!(
            "Read {} records from {} (entity {})",
            emitted,
            self.definition.name,
            entity_label(entity)
        );
        Ok(emitted)
    }

    async fn read_slice(
        &mut self,
        entity: Option<&EntityId>,
        slice: &TimeSlice,
        observed: &mut Option<Watermark>,
        sink: &mut dyn MessageSink,
    ) -> SyncResult<usize> {
        let fallback = self.definition.fallback();
        if let Some(fallback) = fallback.filter(|_| self.via_parent) {
            return self
                .read_slice_via_parent(fallback, entity, slice, observed, sink)
                .await;
        }

        let direct = self.read_slice_direct(entity, slice, observed, sink).await;
        match (direct, fallback) {
            (Err(SyncError::Client(e)), Some(fallback)) if is_unsupported_cursor_error(&e) => {
                warn!(
                    "{} rejected the cursor filter, reading through {}: {}",
                    fallback.child, fallback.parent, e
                );
                self.via_parent = true;
                self.read_slice_via_parent(fallback, entity, slice, observed, sink)
                    .await
            }
            (other, _) => other,
        }
    }

    async fn read_slice_direct(
        &self,
        entity: Option<&EntityId>,
        slice: &TimeSlice,
        observed: &mut Option<Watermark>,
        sink: &mut dyn MessageSink,
    ) -> SyncResult<usize> {
        let spec = QuerySpec::all_fields(
            self.definition.object.as_str(),
            self.build_query(Some(slice)),
        );
        let mut pager = self.executor.query(spec, entity);
        let mut emitted = 0;
        while let Some(page) = pager.next_page().await? {
            for record in page.records {
                let record = prepare_record(record, entity);
                track_cursor(&record, observed);
                sink.send(SourceMessage::record(&self.definition.name, record))
                    .await?;
                emitted += 1;
            }
        }
        Ok(emitted)
    }

    async fn read_slice_via_parent(
        &self,
        fallback: &ParentFallback,
        entity: Option<&EntityId>,
        slice: &TimeSlice,
        observed: &mut Option<Watermark>,
        sink: &mut dyn MessageSink,
    ) -> SyncResult<usize> {
        let query = slice.filter_clauses(CURSOR_FIELD).join(" AND ");
        let spec = QuerySpec::all_fields(fallback.parent, query)
            .with_fields(&[PRIMARY_KEY, CURSOR_FIELD]);
        let mut pager = self.executor.query(spec, entity);
        let api = self.executor.api();

        let mut emitted = 0;
        while let Some(page) = pager.next_page().await? {
            for parent in page.records {
                let Some(key) = parent.get(PRIMARY_KEY).and_then(key_text) else {
                    continue;
                };
                let parent_cursor = parent.get(CURSOR_FIELD).cloned().unwrap_or(Value::Null);
                let full = api.read(fallback.parent, &[key.as_str()], &["*"], entity).await?;

                for record in &full {
                    for mut item in extract_child_items(record, fallback.child) {
                        item.insert(
                            fallback.parent_key_field.to_string(),
                            parent[PRIMARY_KEY].clone(),
                        );
                        item.insert(CURSOR_FIELD.to_string(), parent_cursor.clone());
                        let item = prepare_record(item, entity);
                        track_cursor(&item, observed);
                        sink.send(SourceMessage::record(&self.definition.name, item))
                            .await?;
                        emitted += 1;
                    }
                }
            }
        }
        debug!(
            stream = %self.definition.name,
            parent = fallback.parent,
            emitted,
            "Read slice through parent"
        );
        Ok(emitted)
    }
}

/// Flattens a record, normalizes its cursor and stamps its entity.
pub fn prepare_record(record: Record, entity: Option<&EntityId>) -> Record {
    let mut record = flatten_record(&record, FLATTEN_SEPARATOR);
    if let Some(Value::String(raw)) = record.get(CURSOR_FIELD) {
        if let Some(normalized) = normalize_timestamp(raw) {
            record.insert(CURSOR_FIELD.to_string(), Value::String(normalized));
        }
    }
    record.insert(
        ENTITY_FIELD.to_string(),
        entity.map_or(Value::Null, |e| Value::String(e.as_str().to_string())),
    );
    record
}

fn track_cursor(record: &Record, observed: &mut Option<Watermark>) {
    let Some(Value::String(raw)) = record.get(CURSOR_FIELD) else {
        return;
    };
    if let Ok(watermark) = Watermark::parse(raw) {
        if observed.is_none_or(|current| watermark > current) {
            *observed = Some(watermark);
        }
    }
}

fn key_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn entity_label(entity: Option<&EntityId>) -> &str {
    entity.map_or("<none>", EntityId::as_str)
}
