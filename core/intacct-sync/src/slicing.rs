//! Time slicing for incremental queries.

use chrono::{DateTime, Duration, Utc};
use intacct_types::{Watermark, format_query_datetime};

/// A half-open modification-time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlice {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSlice {
    /// Creates a slice.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Filter clauses bounding `field` to this slice, in gateway format.
    pub fn filter_clauses(&self, field: &str) -> [String; 2] {
        [
            format!("{field} >= '{}'", format_query_datetime(&self.start)),
            format!("{field} < '{}'", format_query_datetime(&self.end)),
        ]
    }
}

/// Where an entity's incremental read starts.
///
/// Without a prior cursor this is the global start date. Otherwise the
/// lookback window is subtracted from the cursor, but never past the global
/// start date. A lookback reaching before the representable range clamps to
/// the global start date.
pub fn compute_start(
    global_start: DateTime<Utc>,
    prior_cursor: Option<Watermark>,
    lookback: Duration,
) -> DateTime<Utc> {
    match prior_cursor {
        None => global_start,
        Some(cursor) => cursor
            .as_datetime()
            .checked_sub_signed(lookback)
            .map_or(global_start, |start| start.max(global_start)),
    }
}

/// Tiles `[start, end)` with contiguous slices of width `step`.
///
/// The last slice is clipped to `end`, as is any step overflowing the
/// representable range. An empty or inverted range yields no
/// slices; a non-positive step yields the whole range as one slice.
pub fn generate_slices(start: DateTime<Utc>, end: DateTime<Utc>, step: Duration) -> Vec<TimeSlice> {
    if start >= end {
        return Vec::new();
    }
    if step <= Duration::zero() {
        return vec![TimeSlice::new(start, end)];
    }

    let mut slices = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let slice_end = cursor
            .checked_add_signed(step)
            .map_or(end, |next| next.min(end));
        slices.push(TimeSlice::new(cursor, slice_end));
        cursor = slice_end;
    }
    slices
}
