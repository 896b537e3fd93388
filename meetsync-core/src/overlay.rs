//! Exception overlay for recurring series.
//!
//! Maps each generated occurrence start through the series' exception
//! records: untouched starts become plain instances of the master,
//! moved occurrences take the exception's data, cancelled ones are
//! suppressed.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::event::{Event, EventStatus, EventTime, RecurringExceptionEvent};
use crate::occurrence::{Occurrence, OccurrenceKey};

/// Outcome of resolving one occurrence start against the overlay.
#[derive(Debug, Clone)]
pub enum ResolvedOccurrence {
    Instance(Occurrence),
    /// The occurrence was cancelled; nothing is materialized for it.
    Suppressed,
}

/// Resolve a single occurrence start of `master` against the series'
/// exception records, keyed by canonical occurrence key.
pub fn resolve_occurrence(
    master: &Event,
    start: DateTime<Utc>,
    exceptions: &HashMap<String, RecurringExceptionEvent>,
) -> ResolvedOccurrence {
    let key = OccurrenceKey::new(&master.provider_id, start).canonical();

    match exceptions.get(&key) {
        Some(exception)
            if exception.event.is_deleted || exception.event.status == EventStatus::Cancelled =>
        {
            ResolvedOccurrence::Suppressed
        }
        Some(exception) => ResolvedOccurrence::Instance(Occurrence {
            id: key,
            series_id: Some(master.id.clone()),
            original_start: Some(start),
            event: exception.event.clone(),
        }),
        None => ResolvedOccurrence::Instance(generated_instance(master, start, key)),
    }
}

/// A plain instance of the master at `start`: same data, shifted times,
/// recurrence fields cleared.
fn generated_instance(master: &Event, start: DateTime<Utc>, key: String) -> Occurrence {
    let duration = master.duration().unwrap_or_else(Duration::zero);

    let mut event = master.clone();
    event.start = Some(match &master.start {
        Some(master_start) => master_start.with_instant(start),
        None => EventTime::utc(start),
    });
    event.end = master.end.as_ref().map(|end| end.with_instant(start + duration));
    event.is_recurring = false;
    event.recurrence = None;
    event.recurrence_end = None;

    Occurrence {
        id: key,
        series_id: Some(master.id.clone()),
        original_start: None,
        event,
    }
}
