//! Flat records emitted by the source.

use serde_json::{Map, Value};

/// A record as a key/value mapping.
pub type Record = Map<String, Value>;

/// Separator joining ancestor tag names when flattening.
pub const FLATTEN_SEPARATOR: &str = "_";

/// Collapses nested mappings into a single namespace.
///
/// `{BILLTO: {MAILADDRESS: {ADDRESS1: "x"}}}` becomes
/// `{BILLTO_MAILADDRESS_ADDRESS1: "x"}`. Lists and scalars are kept as-is,
/// and an empty nested mapping stays under its own key so nothing is lost.
/// Applying the transform to an already-flat record is a no-op.
#[must_use]
pub fn flatten_record(record: &Record, separator: &str) -> Record {
    let mut out = Record::new();
    for (key, value) in record {
        flatten_into(key, value, separator, &mut out);
    }
    out
}

fn flatten_into(path: &str, value: &Value, separator: &str, out: &mut Record) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let joined = format!("{path}{separator}{key}");
                flatten_into(&joined, child, separator, out);
            }
        }
        other => {
            out.insert(path.to_string(), other.clone());
        }
    }
}
