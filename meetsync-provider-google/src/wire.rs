//! Serde views of the Calendar v3 `events.list` payload.
//!
//! Only the fields the normalizer consumes are modeled; everything else
//! in the payload is ignored.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

/// One page of the change feed. `next_sync_token` is only present on
/// the final page of a pass, `next_page_token` on every other page.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventsPage {
    #[serde(default)]
    pub items: Vec<GoogleEvent>,
    pub next_page_token: Option<String>,
    pub next_sync_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleEvent {
    pub id: String,
    pub status: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<GoogleEventTime>,
    pub end: Option<GoogleEventTime>,
    pub recurrence: Option<Vec<String>>,
    /// Present on instances of a recurring series, absent on masters
    /// and single events.
    pub recurring_event_id: Option<String>,
    pub original_start_time: Option<GoogleEventTime>,
    pub organizer: Option<GoogleOrganizer>,
    #[serde(default)]
    pub attendees: Vec<GoogleAttendee>,
    #[serde(default)]
    pub attachments: Vec<GoogleAttachment>,
    pub transparency: Option<String>,
    pub html_link: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

/// Either a zoned instant (`date_time`) or a bare date for all-day
/// events (`date`); never both.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleEventTime {
    pub date_time: Option<DateTime<Utc>>,
    pub date: Option<NaiveDate>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleOrganizer {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleAttendee {
    pub email: Option<String>,
    pub response_status: Option<String>,
    #[serde(default)]
    pub optional: bool,
    /// Meeting rooms and equipment; dropped during normalization.
    #[serde(default)]
    pub resource: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleAttachment {
    pub file_id: Option<String>,
    pub file_url: Option<String>,
    pub mime_type: Option<String>,
}
