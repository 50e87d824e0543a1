mod common;

use common::utc;
use intacct_sync::{SourceState, StreamState, SyncError};
use intacct_types::{EntityId, Watermark};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;

fn wm(s: &str) -> Watermark {
    Watermark::parse(s).unwrap()
}

// ── Stream state ─────────────────────────────────────────────────

#[test]
fn observe_inserts_first_cursor() {
    let mut state = StreamState::new();
    let e1 = EntityId::new("E1");
    assert!(state.is_empty());
    assert!(state.observe(Some(&e1), wm("2024-01-02T00:00:00Z")));
    assert_eq!(state.cursor(Some(&e1)), Some(wm("2024-01-02T00:00:00Z")));
}

#[test]
fn observe_never_regresses() {
    let mut state = StreamState::new();
    let e1 = EntityId::new("E1");
    state.observe(Some(&e1), wm("2024-01-05T00:00:00Z"));

    assert!(!state.observe(Some(&e1), wm("2024-01-03T00:00:00Z")));
    assert!(!state.observe(Some(&e1), wm("2024-01-05T00:00:00Z")));
    assert_eq!(state.cursor(Some(&e1)), Some(wm("2024-01-05T00:00:00Z")));

    assert!(state.observe(Some(&e1), wm("2024-01-06T00:00:00Z")));
    assert_eq!(state.cursor(Some(&e1)), Some(wm("2024-01-06T00:00:00Z")));
}

#[test]
fn entities_do_not_interfere() {
    let mut state = StreamState::new();
    let e1 = EntityId::new("E1");
    let e2 = EntityId::new("E2");

    state.observe(Some(&e1), wm("2024-01-02T00:00:00Z"));
    state.observe(Some(&e2), wm("2024-01-03T00:00:00Z"));

    assert_eq!(
        serde_json::to_value(&state).unwrap(),
        json!({
            "entities": {
                "E1": {"cursor": "2024-01-02T00:00:00Z"},
                "E2": {"cursor": "2024-01-03T00:00:00Z"},
            }
        })
    );
}

#[test]
fn unscoped_cursor_uses_root_key() {
    let mut state = StreamState::new();
    state.observe(None, Watermark::new(utc(2024, 1, 1, 0, 0, 0)));
    assert_eq!(
        serde_json::to_value(&state).unwrap(),
        json!({"entities": {"_root": {"cursor": "2024-01-01T00:00:00Z"}}})
    );
    assert!(state.cursor(Some(&EntityId::new("E1"))).is_none());
}

#[test]
fn stored_gateway_format_cursor_loads() {
    let state: StreamState = serde_json::from_value(json!({
        "entities": {"E1": {"cursor": "01/26/2026 13:37:29"}}
    }))
    .unwrap();
    assert_eq!(
        state.cursor(Some(&EntityId::new("E1"))).unwrap().to_string(),
        "2026-01-26T13:37:29Z"
    );
}

// ── Source state input ───────────────────────────────────────────

#[test]
fn source_state_from_mapping() {
    let state = SourceState::from_value(json!({
        "customers": {"entities": {"E1": {"cursor": "2024-01-02T00:00:00Z"}}}
    }))
    .unwrap();

    assert_eq!(
        state.stream("customers").cursor(Some(&EntityId::new("E1"))),
        Some(wm("2024-01-02T00:00:00Z"))
    );
    assert!(state.stream("orders").is_empty());
}

#[test]
fn source_state_from_stream_messages() {
    let state = SourceState::from_value(json!([
        {
            "type": "STREAM",
            "stream": {
                "stream_descriptor": {"name": "orders"},
                "stream_state": {"entities": {"_root": {"cursor": "2024-03-01T00:00:00Z"}}}
            }
        },
        {"type": "STREAM", "stream": {"stream_descriptor": {"name": "skipped"}}},
        {"type": "LEGACY", "data": {}}
    ]))
    .unwrap();

    assert_eq!(state.stream_names().collect::<Vec<_>>(), vec!["orders"]);
    assert_eq!(
        state.stream("orders").cursor(None),
        Some(wm("2024-03-01T00:00:00Z"))
    );
}

#[test]
fn source_state_null_is_empty() {
    let state = SourceState::from_value(serde_json::Value::Null).unwrap();
    assert_eq!(state.stream_names().count(), 0);
}

#[test]
fn source_state_rejects_bad_cursor() {
    let err = SourceState::from_value(json!({
        "customers": {"entities": {"E1": {"cursor": "not a date"}}}
    }))
    .unwrap_err();
    assert!(matches!(err, SyncError::State(_)));
}

#[test]
fn source_state_rejects_scalar() {
    assert!(SourceState::from_value(json!(42)).is_err());
}

// ── Properties ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn cursor_is_running_maximum(
        updates in prop::collection::vec((0usize..3, 1_600_000_000i64..1_700_000_000), 1..40)
    ) {
        let entities = [EntityId::new("A"), EntityId::new("B"), EntityId::new("C")];
        let mut state = StreamState::new();
        let mut expected: [Option<i64>; 3] = [None; 3];

        for (index, secs) in updates {
            let before = state.cursor(Some(&entities[index]));
            let candidate = Watermark::new(chrono::DateTime::from_timestamp(secs, 0).unwrap());
            state.observe(Some(&entities[index]), candidate);
            let after = state.cursor(Some(&entities[index])).unwrap();

            if let Some(before) = before {
                prop_assert!(after >= before);
            }
            expected[index] = Some(expected[index].map_or(secs, |m| m.max(secs)));
        }

        for (entity, max) in entities.iter().zip(expected) {
            prop_assert_eq!(
                state.cursor(Some(entity)).map(|w| w.as_datetime().timestamp()),
                max
            );
        }
    }
}
