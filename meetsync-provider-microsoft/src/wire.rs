//! Serde views of the Graph `calendarView/delta` payload.

use chrono::{DateTime, Utc};
use meetsync_core::recurrence::pattern::PatternedRecurrence;
use serde::Deserialize;

/// One page of the delta feed. Exactly one of the two continuation
/// links is present: `@odata.nextLink` mid-pass, `@odata.deltaLink` on
/// the final page.
#[derive(Debug, Deserialize)]
pub(crate) struct DeltaFeed {
    #[serde(default)]
    pub value: Vec<GraphEvent>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
    #[serde(rename = "@odata.deltaLink")]
    pub delta_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphEvent {
    pub id: String,
    /// singleInstance, seriesMaster, occurrence or exception.
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    /// Deletion marker; removed items carry nothing but their id.
    #[serde(rename = "@removed")]
    pub removed: Option<RemovedMarker>,
    pub subject: Option<String>,
    pub body: Option<GraphBody>,
    pub location: Option<GraphLocation>,
    pub start: Option<GraphDateTime>,
    pub end: Option<GraphDateTime>,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub is_cancelled: bool,
    pub series_master_id: Option<String>,
    pub original_start: Option<DateTime<Utc>>,
    pub organizer: Option<GraphRecipient>,
    #[serde(default)]
    pub attendees: Vec<GraphAttendee>,
    pub recurrence: Option<PatternedRecurrence>,
    #[serde(default)]
    pub has_attachments: bool,
    pub web_link: Option<String>,
    pub created_date_time: Option<DateTime<Utc>>,
    pub last_modified_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RemovedMarker {
    #[allow(dead_code)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphBody {
    pub content_type: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphLocation {
    pub display_name: Option<String>,
}

/// A local wall-clock time plus the zone it is expressed in. The
/// adapter asks Graph for UTC, but tenant policies can override the
/// preference, so the zone is honored when it parses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphDateTime {
    pub date_time: String,
    pub time_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphRecipient {
    pub email_address: Option<GraphEmailAddress>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphEmailAddress {
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphAttendee {
    /// required, optional or resource; resources (and typeless
    /// entries) are dropped during normalization.
    #[serde(rename = "type")]
    pub attendee_type: Option<String>,
    pub status: Option<GraphResponseStatus>,
    pub email_address: Option<GraphEmailAddress>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphResponseStatus {
    pub response: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AttachmentsResponse {
    #[serde(default)]
    pub value: Vec<GraphAttachment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphAttachment {
    pub id: Option<String>,
    pub content_type: Option<String>,
    /// Present on reference attachments only; file attachments carry
    /// their bytes inline and have no URL.
    pub source_url: Option<String>,
}
