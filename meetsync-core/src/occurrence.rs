//! Occurrence identity and expanded instances.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::Event;

/// Identity of a single occurrence inside a recurring series.
///
/// The canonical form is the stored id of exception documents and the
/// join key between expansion output and the exception overlay. It is
/// compared by construction on both sides and never parsed back into
/// its parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OccurrenceKey {
    /// Provider id of the master series.
    pub series_id: String,
    /// The occurrence's original start, in UTC.
    pub start_utc: DateTime<Utc>,
}

impl OccurrenceKey {
    pub fn new(series_id: &str, start_utc: DateTime<Utc>) -> Self {
        OccurrenceKey {
            series_id: series_id.to_string(),
            start_utc,
        }
    }

    /// Canonical string form: series id and epoch milliseconds joined by
    /// a double underscore.
    pub fn canonical(&self) -> String {
        format!("{}__{}", self.series_id, self.start_utc.timestamp_millis())
    }
}

/// One concrete event instance inside a date range.
///
/// Either a single event passed through unchanged, or one generated
/// start of a recurring series (with the exception overlay already
/// applied).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    /// The occurrence's own id: the event id for singles, the canonical
    /// occurrence key for generated instances.
    pub id: String,
    /// Stored id of the master series, for generated instances.
    pub series_id: Option<String>,
    /// Original (pre-override) start for instances that came out of an
    /// exception record.
    pub original_start: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub event: Event,
}

impl Occurrence {
    /// A single, non-recurring event as its own occurrence.
    pub fn single(event: Event) -> Self {
        Occurrence {
            id: event.id.clone(),
            series_id: None,
            original_start: None,
            event,
        }
    }
}
