//! Provider-neutral event types.
//!
//! These types represent calendar events in a provider-agnostic way.
//! Provider adapters convert their API payloads into them, and the
//! reconciler, overlay and materializer work exclusively with them.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MeetsyncError, MeetsyncResult};
use crate::provider::Provider;

/// Resource-prefix for event ids, matching the store's id scheme.
const EVENT_ID_PREFIX: &str = "EVT";

/// A canonical meeting record.
///
/// Created either by direct user action (through the API layer) or by the
/// sync reconciler from provider data. Provider-authoritative fields are
/// overwritten on subsequent sync passes; section/ownership fields are
/// locally owned and preserved. Events are soft-deleted (`is_deleted` +
/// `status: Cancelled`), never physically removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Opaque stable identifier, immutable once assigned.
    pub id: String,
    pub provider: Provider,
    /// The provider's native event id. `(provider, provider_id)` is
    /// unique per owning user.
    pub provider_id: String,
    /// Sections through which this event is visible. An event can be
    /// shared into several sections owned by different users.
    pub meetsections: BTreeSet<SectionAssignment>,
    /// Owning account's user id (the account email).
    pub user: String,

    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    /// Absent only on deletion tombstones.
    pub start: Option<EventTime>,
    pub end: Option<EventTime>,
    /// True iff the provider reported a date-only start.
    pub is_all_day: bool,
    pub organizer: Option<String>,
    pub attendees: Vec<Attendee>,
    pub status: EventStatus,

    pub is_recurring: bool,
    /// RRULE/RDATE/EXRULE/EXDATE lines, timezone-naive. `Some` and
    /// non-empty iff `is_recurring`.
    pub recurrence: Option<Vec<String>>,
    /// End of the final occurrence (last start + event duration),
    /// derived when recurrence is set. `None` for unbounded rules.
    pub recurrence_end: Option<DateTime<Utc>>,

    pub attachments: Vec<Attachment>,
    pub transparency: Option<Transparency>,
    pub web_link: Option<String>,

    pub is_deleted: bool,

    /// Server-assigned timestamps.
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Provider-reported timestamps.
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

impl Event {
    /// An empty event shell; normalizers fill in the provider fields and
    /// the reconciler assigns identity and section ownership.
    pub fn new(provider: Provider, provider_id: &str, user: &str) -> Self {
        Event {
            id: String::new(),
            provider,
            provider_id: provider_id.to_string(),
            meetsections: BTreeSet::new(),
            user: user.to_string(),
            title: None,
            description: None,
            location: None,
            start: None,
            end: None,
            is_all_day: false,
            organizer: None,
            attendees: Vec::new(),
            status: EventStatus::Confirmed,
            is_recurring: false,
            recurrence: None,
            recurrence_end: None,
            attachments: Vec::new(),
            transparency: None,
            web_link: None,
            is_deleted: false,
            created_at: None,
            updated_at: None,
            created: None,
            updated: None,
        }
    }

    /// New opaque event id (`EVT` + hex uuid, the store's id scheme).
    pub fn generate_id() -> String {
        format!("{}{}", EVENT_ID_PREFIX, Uuid::new_v4().simple())
    }

    /// Event duration, when both ends are known.
    pub fn duration(&self) -> Option<Duration> {
        match (&self.start, &self.end) {
            (Some(s), Some(e)) => Some(e.to_utc() - s.to_utc()),
            _ => None,
        }
    }

    /// Content equality ignoring the server-assigned timestamps.
    ///
    /// Drives no-op detection in upserts: re-syncing unchanged provider
    /// state must not count as a write.
    pub fn same_content(&self, other: &Event) -> bool {
        let mut a = self.clone();
        let mut b = other.clone();
        a.created_at = None;
        a.updated_at = None;
        b.created_at = None;
        b.updated_at = None;
        a == b
    }

    /// Checks the recurrence pairing invariant.
    pub fn validate(&self) -> MeetsyncResult<()> {
        let has_rules = self.recurrence.as_ref().is_some_and(|r| !r.is_empty());
        if self.is_recurring != has_rules {
            return Err(MeetsyncError::Validation(
                "recurrence rules must be present exactly when the event is recurring".into(),
            ));
        }
        if self.provider_id.is_empty() {
            return Err(MeetsyncError::Validation("provider id is mandatory".into()));
        }
        Ok(())
    }

    /// Section ids this event is visible through.
    pub fn section_ids(&self) -> BTreeSet<String> {
        self.meetsections
            .iter()
            .map(|m| m.section_id.clone())
            .collect()
    }
}

/// One modified or cancelled occurrence of a recurring series.
///
/// Its id is a pure function of (series provider id, original instance
/// start), see [`crate::occurrence::OccurrenceKey`], which is what makes
/// exception lookup during expansion a direct key fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringExceptionEvent {
    #[serde(flatten)]
    pub event: Event,
    /// Provider id of the master series this exception belongs to.
    pub recurring_event_provider_id: String,
    /// The occurrence's original (pre-override) start.
    pub original_start: Option<EventTime>,
}

impl RecurringExceptionEvent {
    /// Deterministic exception id, derived from the series provider id
    /// and the original start instant. `None` when the provider omitted
    /// the original start.
    pub fn exception_id(&self) -> Option<String> {
        self.original_start.as_ref().map(|start| {
            crate::occurrence::OccurrenceKey {
                series_id: self.recurring_event_provider_id.clone(),
                start_utc: start.to_utc(),
            }
            .canonical()
        })
    }
}

/// Membership of an event in a meetsection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionAssignment {
    pub section_id: String,
    /// The member whose account carried the event into this section.
    pub owning_user_id: String,
}

/// An event attendee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub email: String,
    pub response_status: ResponseStatus,
    #[serde(default)]
    pub optional: bool,
}

/// Canonical attendee response vocabulary.
///
/// Provider adapters translate to and from this fixed set; the mapping
/// must round-trip for all four values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    None,
    Accepted,
    Declined,
    Tentative,
}

/// A file attached to an event. Always provider-hosted (`external`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: Option<String>,
    pub url: Option<String>,
    pub mime_type: Option<String>,
    pub external: bool,
}

/// Event transparency (busy/free status).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transparency {
    Opaque,
    Transparent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
}

/// An instant plus the IANA zone the provider reported it in, if any.
///
/// Rule evaluation always happens on the UTC instant; the zone is kept
/// for presentation and for stamping expanded instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: DateTime<Utc>,
    pub timezone: Option<Tz>,
}

impl EventTime {
    pub fn utc(date_time: DateTime<Utc>) -> Self {
        EventTime {
            date_time,
            timezone: None,
        }
    }

    pub fn zoned(date_time: DateTime<Utc>, timezone: Tz) -> Self {
        EventTime {
            date_time,
            timezone: Some(timezone),
        }
    }

    /// All-day representation: midnight UTC of the date.
    pub fn date(date: NaiveDate) -> Self {
        EventTime {
            date_time: date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc(),
            timezone: None,
        }
    }

    pub fn to_utc(&self) -> DateTime<Utc> {
        self.date_time
    }

    /// Same zone, different instant.
    pub fn with_instant(&self, date_time: DateTime<Utc>) -> Self {
        EventTime {
            date_time,
            timezone: self.timezone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_event() -> Event {
        let mut event = Event::new(Provider::Google, "prov-1", "ana@example.com");
        event.id = Event::generate_id();
        event.title = Some("Standup".into());
        event.start = Some(EventTime::utc(
            Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
        ));
        event.end = Some(EventTime::utc(
            Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap(),
        ));
        event
    }

    #[test]
    fn generated_ids_carry_the_resource_prefix() {
        let id = Event::generate_id();
        assert!(id.starts_with("EVT"));
        assert_eq!(id.len(), 3 + 32);
    }

    #[test]
    fn same_content_ignores_server_timestamps() {
        let a = sample_event();
        let mut b = a.clone();
        b.created_at = Some(Utc::now());
        b.updated_at = Some(Utc::now());
        assert!(a.same_content(&b));

        b.title = Some("Retro".into());
        assert!(!a.same_content(&b));
    }

    #[test]
    fn validate_rejects_unpaired_recurrence() {
        let mut event = sample_event();
        event.is_recurring = true;
        assert!(event.validate().is_err());

        event.recurrence = Some(vec!["RRULE:FREQ=DAILY".into()]);
        assert!(event.validate().is_ok());

        event.is_recurring = false;
        assert!(event.validate().is_err());
    }

    #[test]
    fn event_duration_spans_start_to_end() {
        let event = sample_event();
        assert_eq!(event.duration(), Some(Duration::minutes(30)));
        assert_eq!(
            Event::new(Provider::Google, "x", "u").duration(),
            None
        );
    }

    #[test]
    fn exception_id_is_derived_from_original_start() {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
        let exception = RecurringExceptionEvent {
            event: sample_event(),
            recurring_event_provider_id: "series-9".into(),
            original_start: Some(EventTime::utc(start)),
        };
        assert_eq!(
            exception.exception_id().as_deref(),
            Some("series-9__1705309200000")
        );
    }
}
