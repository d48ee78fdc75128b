pub mod access;
pub mod booking;
pub mod lifecycle;
pub mod schedule;
pub mod slots;

use chrono::NaiveDateTime;
use uuid::Uuid;

/// PostgREST filter for the clinic bucket. `None` is its own bucket and
/// must match `is.null`, never be dropped from the query.
pub(crate) fn clinic_filter(clinic_id: Option<Uuid>) -> String {
    match clinic_id {
        Some(id) => format!("clinic_id=eq.{}", id),
        None => "clinic_id=is.null".to_string(),
    }
}

/// Naive local timestamps on the wire, no zone suffix.
pub(crate) fn fmt_ts(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S").to_string()
}
