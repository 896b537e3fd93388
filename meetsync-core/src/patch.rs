//! Partial event updates from user edits.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::error::{MeetsyncError, MeetsyncResult};
use crate::event::{Attendee, Event, EventStatus, EventTime, SectionAssignment, Transparency};
use crate::recurrence;

/// Fields a user is allowed to edit directly.
const ALLOWED_FIELDS: &[&str] = &[
    "title",
    "description",
    "location",
    "start",
    "end",
    "isAllDay",
    "status",
    "transparency",
    "attendees",
    "recurrence",
    "meetsections",
];

/// A validated partial update.
///
/// Built from loosely-typed JSON; any key outside the editable set is
/// rejected before deserialization, so identity and provider fields can
/// never be smuggled through an update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<EventTime>,
    pub end: Option<EventTime>,
    pub is_all_day: Option<bool>,
    pub status: Option<EventStatus>,
    pub transparency: Option<Transparency>,
    pub attendees: Option<Vec<Attendee>>,
    /// New recurrence lines. An empty list clears the recurrence.
    pub recurrence: Option<Vec<String>>,
    /// Moves the event between sections. Sync preserves these, so the
    /// move sticks across later provider rewrites.
    pub meetsections: Option<BTreeSet<SectionAssignment>>,
}

impl EventPatch {
    pub fn from_json(value: serde_json::Value) -> MeetsyncResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| MeetsyncError::Validation("update must be an object".into()))?;

        for key in object.keys() {
            if !ALLOWED_FIELDS.contains(&key.as_str()) {
                return Err(MeetsyncError::InvalidField(key.clone()));
            }
        }

        serde_json::from_value(value).map_err(|e| MeetsyncError::Serialization(e.to_string()))
    }

    /// Applies the patch and re-derives the recurrence fields.
    pub fn apply(&self, event: &mut Event, expansion_limit: u16) -> MeetsyncResult<()> {
        if let Some(title) = &self.title {
            event.title = Some(title.clone());
        }
        if let Some(description) = &self.description {
            event.description = Some(description.clone());
        }
        if let Some(location) = &self.location {
            event.location = Some(location.clone());
        }
        if let Some(start) = &self.start {
            event.start = Some(start.clone());
        }
        if let Some(end) = &self.end {
            event.end = Some(end.clone());
        }
        if let Some(is_all_day) = self.is_all_day {
            event.is_all_day = is_all_day;
        }
        if let Some(status) = self.status {
            event.status = status;
        }
        if let Some(transparency) = self.transparency {
            event.transparency = Some(transparency);
        }
        if let Some(attendees) = &self.attendees {
            event.attendees = attendees.clone();
        }
        if let Some(meetsections) = &self.meetsections {
            event.meetsections = meetsections.clone();
        }
        if let Some(rules) = &self.recurrence {
            if rules.is_empty() {
                event.is_recurring = false;
                event.recurrence = None;
            } else {
                event.is_recurring = true;
                event.recurrence = Some(rules.clone());
            }
        }

        // Timing and rule edits invalidate the derived series end.
        event.recurrence_end = if event.is_recurring {
            recurrence::derive_recurrence_end(event, expansion_limit)?
        } else {
            None
        };

        event.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    fn base_event() -> Event {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let mut event = Event::new(Provider::Google, "p1", "ana@example.com");
        event.id = Event::generate_id();
        event.start = Some(EventTime::utc(start));
        event.end = Some(EventTime::utc(start + Duration::hours(1)));
        event
    }

    #[test]
    fn unknown_fields_are_rejected_by_name() {
        let err = EventPatch::from_json(json!({"providerId": "sneaky"})).unwrap_err();
        match err {
            MeetsyncError::InvalidField(field) => assert_eq!(field, "providerId"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn title_edits_apply() {
        let mut event = base_event();
        let patch = EventPatch::from_json(json!({"title": "Planning"})).unwrap();
        patch.apply(&mut event, 730).unwrap();
        assert_eq!(event.title.as_deref(), Some("Planning"));
    }

    #[test]
    fn section_moves_apply() {
        let mut event = base_event();
        let patch = EventPatch::from_json(json!({
            "meetsections": [
                {"sectionId": "SECteam", "owningUserId": "ana@example.com"}
            ]
        }))
        .unwrap();
        patch.apply(&mut event, 730).unwrap();

        let assignment = event.meetsections.iter().next().unwrap();
        assert_eq!(assignment.section_id, "SECteam");
    }

    #[test]
    fn adding_recurrence_derives_the_series_end() {
        let mut event = base_event();
        let patch =
            EventPatch::from_json(json!({"recurrence": ["RRULE:FREQ=DAILY;COUNT=3"]})).unwrap();
        patch.apply(&mut event, 730).unwrap();

        assert!(event.is_recurring);
        let expected_end =
            Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap() + Duration::hours(1);
        assert_eq!(event.recurrence_end, Some(expected_end));
    }

    #[test]
    fn empty_recurrence_clears_the_series() {
        let mut event = base_event();
        event.is_recurring = true;
        event.recurrence = Some(vec!["RRULE:FREQ=DAILY".into()]);

        let patch = EventPatch::from_json(json!({"recurrence": []})).unwrap();
        patch.apply(&mut event, 730).unwrap();

        assert!(!event.is_recurring);
        assert_eq!(event.recurrence, None);
        assert_eq!(event.recurrence_end, None);
    }
}
