//! Conversion from raw Graph payloads to canonical events.

use chrono::{NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use meetsync_core::recurrence::derive_recurrence_end;
use meetsync_core::{
    Account, Attachment, Attendee, ChangedEvent, Event, EventChange, EventStatus, EventTime,
    Provider, SeriesLink,
};
use tracing::{debug, warn};

use crate::status::response_from_graph;
use crate::wire::{AttachmentsResponse, GraphBody, GraphDateTime, GraphEvent};

/// Wrap width for flattened HTML bodies.
const BODY_WIDTH: usize = 80;

pub(crate) fn page_changes(
    items: Vec<GraphEvent>,
    account: &Account,
    expansion_limit: u16,
) -> Vec<EventChange> {
    items
        .into_iter()
        .filter_map(|item| normalize_event(item, account, expansion_limit))
        .collect()
}

/// Maps one raw item onto the canonical model.
///
/// `@removed` markers turn into removal changes, plain occurrences are
/// dropped (the engine reconstructs them from the master), everything
/// else upserts.
fn normalize_event(
    raw: GraphEvent,
    account: &Account,
    expansion_limit: u16,
) -> Option<EventChange> {
    if raw.removed.is_some() {
        return Some(EventChange::Removed {
            provider_id: raw.id,
        });
    }
    if raw.item_type.as_deref() == Some("occurrence") {
        return None;
    }

    let GraphEvent {
        id,
        item_type: _,
        removed: _,
        subject,
        body,
        location,
        start,
        end,
        is_all_day,
        is_cancelled,
        series_master_id,
        original_start,
        organizer,
        attendees,
        recurrence,
        has_attachments,
        web_link,
        created_date_time,
        last_modified_date_time,
    } = raw;

    let mut event = Event::new(Provider::Microsoft, &id, &account.user);

    event.title = subject;
    event.description = body.and_then(flatten_body);
    event.location = location.and_then(|l| l.display_name);
    event.start = start.as_ref().and_then(graph_time);
    event.end = end.as_ref().and_then(graph_time);
    event.is_all_day = is_all_day;
    event.organizer = organizer
        .and_then(|o| o.email_address)
        .and_then(|e| e.address);
    event.web_link = web_link;
    event.created = created_date_time;
    event.updated = last_modified_date_time;
    event.status = if is_cancelled {
        EventStatus::Cancelled
    } else {
        EventStatus::Confirmed
    };

    for attendee in attendees {
        // Typeless entries are rooms and equipment in practice; both
        // are dropped along with explicit resources.
        let attendee_type = match attendee.attendee_type.as_deref() {
            None | Some("resource") => continue,
            Some(attendee_type) => attendee_type,
        };
        let Some(email) = attendee.email_address.and_then(|e| e.address) else {
            debug!(event = %id, "dropping attendee without email");
            continue;
        };
        let response = attendee.status.and_then(|s| s.response);
        event.attendees.push(Attendee {
            email,
            response_status: response_from_graph(response.as_deref().unwrap_or("none")),
            optional: attendee_type == "optional",
        });
    }

    if let Some(pattern) = recurrence {
        match pattern.to_rrule() {
            Ok(rules) => {
                event.is_recurring = true;
                event.recurrence = Some(rules);
                event.recurrence_end = match derive_recurrence_end(&event, expansion_limit) {
                    Ok(recurrence_end) => recurrence_end,
                    Err(e) => {
                        warn!(event = %id, error = %e, "could not derive recurrence end");
                        None
                    }
                };
            }
            Err(e) => {
                warn!(
                    event = %id,
                    error = %e,
                    "untranslatable recurrence pattern, ingesting as a single event"
                );
            }
        }
    }

    let series = series_master_id.map(|series_provider_id| SeriesLink {
        series_provider_id,
        original_start: original_start.map(EventTime::utc),
    });

    Some(EventChange::Upsert(ChangedEvent {
        event,
        series,
        needs_attachments: has_attachments,
    }))
}

pub(crate) fn attachments(response: AttachmentsResponse) -> Vec<Attachment> {
    response
        .value
        .into_iter()
        .map(|a| Attachment {
            id: a.id,
            url: a.source_url,
            mime_type: a.content_type,
            external: true,
        })
        .collect()
}

fn flatten_body(body: GraphBody) -> Option<String> {
    let content = body.content?;
    let is_html = body
        .content_type
        .as_deref()
        .is_some_and(|t| t.eq_ignore_ascii_case("html"));
    if is_html {
        return Some(flatten_html(&content));
    }
    Some(content)
}

/// A failed flatten keeps the raw markup; a skipped conversion is
/// better than a dropped description.
fn flatten_html(content: &str) -> String {
    match html2text::from_read(content.as_bytes(), BODY_WIDTH) {
        Ok(text) => text.trim_end().to_string(),
        Err(e) => {
            debug!(error = %e, "failed to flatten HTML body");
            content.to_string()
        }
    }
}

/// Graph sends wall-clock text plus a zone name. The instant is
/// interpreted in that zone when it is a known IANA name, and as UTC
/// otherwise (the adapter requests UTC rendering, so the fallback only
/// fires on tenant-side overrides).
fn graph_time(raw: &GraphDateTime) -> Option<EventTime> {
    let text = raw.date_time.trim_end_matches('Z');
    let naive = match NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => naive,
        Err(e) => {
            debug!(value = %raw.date_time, error = %e, "unparseable Graph datetime");
            return None;
        }
    };

    match raw.time_zone.as_deref().map(str::parse::<Tz>) {
        Some(Ok(tz)) => {
            let instant = match tz.from_local_datetime(&naive).earliest() {
                Some(zoned) => zoned.with_timezone(&Utc),
                None => naive.and_utc(),
            };
            Some(EventTime {
                date_time: instant,
                timezone: Some(tz),
            })
        }
        Some(Err(_)) => {
            debug!(zone = raw.time_zone.as_deref(), "unrecognized timezone, assuming UTC");
            Some(EventTime::utc(naive.and_utc()))
        }
        None => Some(EventTime::utc(naive.and_utc())),
    }
}
