//! Reading child objects through their parent.
//!
//! Some child objects reject a modification-time filter. Their records are
//! recovered by querying the parent over the same window, reading each
//! parent in full and pulling the embedded child collection out of it.

use intacct_client::ClientError;
use intacct_types::Record;
use serde_json::Value;

/// Phrases in a failure message that point at an unsupported filter field.
const UNSUPPORTED_FIELD_HINTS: &[&str] = &["whenmodified", "field"];

/// Returns true if a failed query looks like it was rejected because of the
/// cursor field.
///
/// Authentication and transient failures never qualify.
pub fn is_unsupported_cursor_error(error: &ClientError) -> bool {
    if error.is_auth() || error.is_transient() {
        return false;
    }
    let message = error.to_string().to_lowercase();
    UNSUPPORTED_FIELD_HINTS
        .iter()
        .any(|hint| message.contains(hint))
}

/// Pulls the child items embedded in a full parent record.
///
/// Every key containing `child` contributes: an object is one item, a list
/// contributes each of its objects, and a wrapper such as
/// `{"ARINVOICEITEMS": {"arinvoiceitem": [..]}}` is unwrapped first.
pub fn extract_child_items(parent: &Record, child: &str) -> Vec<Record> {
    let mut items = Vec::new();
    for (key, value) in parent {
        if key.contains(child) {
            collect_items(value, child, &mut items);
        }
    }
    items
}

fn collect_items(value: &Value, child: &str, items: &mut Vec<Record>) {
    match value {
        Value::Object(map) => match unwrap_collection(map, child) {
            Some(inner) => collect_items(inner, child, items),
            None => items.push(map.clone()),
        },
        Value::Array(list) => {
            for entry in list {
                if let Value::Object(map) = entry {
                    match unwrap_collection(map, child) {
                        Some(inner) => collect_items(inner, child, items),
                        None => items.push(map.clone()),
                    }
                }
            }
        }
        _ => {}
    }
}

/// A single-key object whose key names the child type is a wrapper.
fn unwrap_collection<'a>(map: &'a Record, child: &str) -> Option<&'a Value> {
    if map.len() != 1 {
        return None;
    }
    let (key, inner) = map.iter().next()?;
    if key.eq_ignore_ascii_case(child) && !matches!(inner, Value::String(_)) {
        Some(inner)
    } else {
        None
    }
}
