//! Recurrence expansion for repeating events.
//!
//! Expands a recurring master event into concrete instances within a
//! date range, applying exception records (moved and cancelled
//! occurrences) on the way out. All rule evaluation happens on UTC
//! instants.

pub mod pattern;

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rrule::RRuleSet;
use tracing::debug;

use crate::error::{MeetsyncError, MeetsyncResult};
use crate::event::{Event, RecurringExceptionEvent};
use crate::occurrence::Occurrence;
use crate::overlay::{self, ResolvedOccurrence};

/// Build the iCalendar text the rrule parser consumes: a synthetic
/// DTSTART line followed by the event's stored recurrence lines.
fn build_rule_text(start: DateTime<Utc>, recurrence: &[String]) -> String {
    let mut lines = Vec::with_capacity(recurrence.len() + 1);
    lines.push(format!("DTSTART:{}", start.format("%Y%m%dT%H%M%SZ")));
    for rule in recurrence {
        lines.push(fix_date_only_values(rule));
    }
    lines.join("\n")
}

/// Providers emit date-only RDATE/EXDATE lines for all-day series; the
/// parser wants date-times. Rewrites `VALUE=DATE:20240301` into
/// `VALUE=DATE-TIME:20240301T000000Z`.
fn fix_date_only_values(line: &str) -> String {
    let is_date_list = line.starts_with("RDATE") || line.starts_with("EXDATE");
    if !is_date_list || !line.contains("VALUE=DATE:") {
        return line.to_string();
    }
    let Some((prop, values)) = line.split_once(':') else {
        return line.to_string();
    };
    let prop = prop.replace("VALUE=DATE", "VALUE=DATE-TIME");
    let values = values
        .split(',')
        .map(|value| {
            let value = value.trim();
            if value.len() == 8 && value.chars().all(|c| c.is_ascii_digit()) {
                format!("{value}T000000Z")
            } else {
                value.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",");
    format!("{prop}:{values}")
}

fn parse_rule_set(
    series_id: &str,
    start: DateTime<Utc>,
    recurrence: &[String],
) -> MeetsyncResult<RRuleSet> {
    build_rule_text(start, recurrence).parse().map_err(|e| {
        MeetsyncError::Validation(format!(
            "Failed to parse recurrence for event '{series_id}': {e}"
        ))
    })
}

/// True when every RRULE line carries a COUNT or UNTIL bound.
///
/// RDATE-only series count as bounded.
pub fn is_bounded(recurrence: &[String]) -> bool {
    recurrence
        .iter()
        .filter(|line| line.trim_start().to_ascii_uppercase().starts_with("RRULE"))
        .all(|line| {
            let upper = line.to_ascii_uppercase();
            upper.contains("COUNT=") || upper.contains("UNTIL=")
        })
}

/// Occurrence start instants of a recurring master within
/// [range_start, range_end], both ends inclusive, capped at `limit`.
///
/// Returns an empty list for events without a start or recurrence.
pub fn occurrence_starts(
    master: &Event,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
    limit: u16,
) -> MeetsyncResult<Vec<DateTime<Utc>>> {
    let (Some(start), Some(rules)) = (&master.start, &master.recurrence) else {
        return Ok(Vec::new());
    };

    let rule_set = parse_rule_set(&master.provider_id, start.to_utc(), rules)?;

    // after/before are exclusive; widen by 1 second to make the range
    // bounds inclusive.
    let tz: rrule::Tz = Utc.into();
    let after = (range_start - Duration::seconds(1)).with_timezone(&tz);
    let before = (range_end + Duration::seconds(1)).with_timezone(&tz);

    let result = rule_set.after(after).before(before).all(limit);
    if result.limited {
        debug!(series = %master.provider_id, limit, "recurrence expansion truncated");
    }

    Ok(result
        .dates
        .into_iter()
        .map(|dt| dt.with_timezone(&Utc))
        .collect())
}

/// End instant of a bounded series: last occurrence start plus the
/// event duration. `None` for unbounded rules and for series too long
/// to enumerate.
pub fn derive_recurrence_end(master: &Event, limit: u16) -> MeetsyncResult<Option<DateTime<Utc>>> {
    let (Some(start), Some(rules)) = (&master.start, &master.recurrence) else {
        return Ok(None);
    };
    if !is_bounded(rules) {
        return Ok(None);
    }

    let rule_set = parse_rule_set(&master.provider_id, start.to_utc(), rules)?;
    let result = rule_set.all(limit);
    if result.limited {
        return Ok(None);
    }

    let duration = master.duration().unwrap_or_else(Duration::zero);
    Ok(result
        .dates
        .last()
        .map(|dt| dt.with_timezone(&Utc) + duration))
}

/// Expand a recurring master into occurrences within
/// [range_start, range_end], with exceptions applied.
///
/// `exceptions` is keyed by canonical occurrence key. Moved occurrences
/// come back with the exception's data; cancelled ones are dropped. The
/// master itself is not included in the output.
pub fn expand_series(
    master: &Event,
    exceptions: &HashMap<String, RecurringExceptionEvent>,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
    limit: u16,
) -> MeetsyncResult<Vec<Occurrence>> {
    let starts = occurrence_starts(master, range_start, range_end, limit)?;

    let mut occurrences = Vec::with_capacity(starts.len());
    for start in starts {
        match overlay::resolve_occurrence(master, start, exceptions) {
            ResolvedOccurrence::Instance(occurrence) => occurrences.push(occurrence),
            ResolvedOccurrence::Suppressed => {}
        }
    }
    Ok(occurrences)
}
