//! Conversion from raw Google payloads to canonical events.

use chrono_tz::Tz;
use meetsync_core::recurrence::derive_recurrence_end;
use meetsync_core::{
    Account, Attachment, Attendee, ChangedEvent, Event, EventChange, EventStatus, EventTime,
    Provider, SeriesLink, Transparency,
};
use tracing::{debug, warn};

use crate::status::response_from_google;
use crate::wire::{GoogleEvent, GoogleEventTime};

pub(crate) fn page_changes(
    items: Vec<GoogleEvent>,
    account: &Account,
    expansion_limit: u16,
) -> Vec<EventChange> {
    items
        .into_iter()
        .map(|item| normalize_event(item, account, expansion_limit))
        .collect()
}

/// Maps one raw item onto the canonical model.
///
/// Google signals deletion through `status: "cancelled"`, on single
/// events and exception instances alike, so every item comes back as an
/// upsert; cancelled payloads carry the tombstone pair and replaying a
/// feed page converges on the same stored state.
fn normalize_event(raw: GoogleEvent, account: &Account, expansion_limit: u16) -> EventChange {
    let GoogleEvent {
        id,
        status,
        summary,
        description,
        location,
        start,
        end,
        recurrence,
        recurring_event_id,
        original_start_time,
        organizer,
        attendees,
        attachments,
        transparency,
        html_link,
        created,
        updated,
    } = raw;

    let mut event = Event::new(Provider::Google, &id, &account.user);

    event.is_all_day = start.as_ref().is_some_and(|t| t.date.is_some());
    event.start = start.as_ref().and_then(event_time);
    event.end = end.as_ref().and_then(event_time);

    event.title = summary;
    event.description = description;
    event.location = location;
    event.organizer = organizer.and_then(|o| o.email);
    event.web_link = html_link;
    event.created = created;
    event.updated = updated;

    event.status = match status.as_deref() {
        Some("cancelled") => EventStatus::Cancelled,
        Some("tentative") => EventStatus::Tentative,
        _ => EventStatus::Confirmed,
    };
    event.is_deleted = event.status == EventStatus::Cancelled;

    for attendee in attendees {
        if attendee.resource {
            continue;
        }
        let Some(email) = attendee.email else {
            debug!(event = %id, "dropping attendee without email");
            continue;
        };
        event.attendees.push(Attendee {
            email,
            response_status: response_from_google(
                attendee.response_status.as_deref().unwrap_or("needsAction"),
            ),
            optional: attendee.optional,
        });
    }

    event.attachments = attachments
        .into_iter()
        .map(|a| Attachment {
            id: a.file_id,
            url: a.file_url,
            mime_type: a.mime_type,
            external: true,
        })
        .collect();

    event.transparency = match transparency.as_deref() {
        Some("transparent") => Some(Transparency::Transparent),
        Some("opaque") => Some(Transparency::Opaque),
        _ => None,
    };

    if let Some(rules) = recurrence.filter(|r| !r.is_empty()) {
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

    let series = recurring_event_id.map(|series_provider_id| SeriesLink {
        series_provider_id,
        original_start: original_start_time.as_ref().and_then(event_time),
    });

    EventChange::Upsert(ChangedEvent {
        event,
        series,
        // Google inlines attachment metadata in the listing payload.
        needs_attachments: false,
    })
}

/// Google sends either a zoned instant or a bare date (all-day).
fn event_time(raw: &GoogleEventTime) -> Option<EventTime> {
    if let Some(instant) = raw.date_time {
        let timezone = raw.time_zone.as_deref().and_then(parse_zone);
        return Some(EventTime {
            date_time: instant,
            timezone,
        });
    }
    raw.date.map(EventTime::date)
}

/// An unrecognized zone name keeps the (already correct) UTC instant
/// and drops only the presentation zone.
fn parse_zone(name: &str) -> Option<Tz> {
    match name.parse::<Tz>() {
        Ok(tz) => Some(tz),
        Err(_) => {
            debug!(zone = name, "unrecognized timezone, keeping the UTC instant");
            None
        }
    }
}
