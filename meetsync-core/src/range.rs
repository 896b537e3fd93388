//! Date-range materialization.
//!
//! Turns the stored event set into the concrete occurrence list for a
//! window: single events pass through, recurring series are expanded
//! with their exception overlay, and everything comes back in one
//! start-ordered list.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{instrument, warn};

use crate::config::SyncConfig;
use crate::error::{MeetsyncError, MeetsyncResult};
use crate::event::{Event, EventStatus, RecurringExceptionEvent};
use crate::occurrence::Occurrence;
use crate::recurrence;
use crate::store::{EventStore, ExceptionStore};

/// A closed query window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> MeetsyncResult<Self> {
        if end <= start {
            return Err(MeetsyncError::Validation(
                "Date range end must come after its start".into(),
            ));
        }
        Ok(DateRange { start, end })
    }

    /// The default forward-looking window: now until `horizon_days`
    /// ahead.
    pub fn upcoming(horizon_days: i64) -> Self {
        let now = Utc::now();
        DateRange {
            start: now,
            end: now + Duration::days(horizon_days),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// True when the event's span intersects the window.
fn overlaps(event: &Event, range: &DateRange) -> bool {
    let Some(start) = event.start.as_ref().map(|t| t.to_utc()) else {
        return false;
    };
    let end = event.end.as_ref().map(|t| t.to_utc()).unwrap_or(start);
    start <= range.end && end >= range.start
}

/// Produces the occurrence list for arbitrary windows.
pub struct RangeMaterializer {
    events: Arc<dyn EventStore>,
    exceptions: Arc<dyn ExceptionStore>,
    config: SyncConfig,
}

impl RangeMaterializer {
    pub fn new(
        events: Arc<dyn EventStore>,
        exceptions: Arc<dyn ExceptionStore>,
        config: SyncConfig,
    ) -> Self {
        RangeMaterializer {
            events,
            exceptions,
            config,
        }
    }

    /// Everything on the user's calendar in the default forward window.
    pub async fn upcoming(&self, user: &str) -> MeetsyncResult<Vec<Occurrence>> {
        let range = DateRange::upcoming(self.config.expansion_horizon_days);
        self.events_in_range(user, &range).await
    }

    /// All occurrences intersecting `range`, start-ordered.
    ///
    /// A series whose recurrence fails to evaluate is skipped with a
    /// warning rather than failing the whole window.
    #[instrument(skip(self))]
    pub async fn events_in_range(
        &self,
        user: &str,
        range: &DateRange,
    ) -> MeetsyncResult<Vec<Occurrence>> {
        let singles = self
            .events
            .singles_in_range(user, range.start, range.end)
            .await?;
        let mut occurrences: Vec<Occurrence> =
            singles.into_iter().map(Occurrence::single).collect();

        let mut produced: HashSet<String> = HashSet::new();

        for master in self
            .events
            .masters_in_range(user, range.start, range.end)
            .await?
        {
            let overlay: HashMap<String, RecurringExceptionEvent> = self
                .exceptions
                .for_series(user, &master.provider_id)
                .await?
                .into_iter()
                .filter_map(|e| e.exception_id().map(|id| (id, e)))
                .collect();

            match recurrence::expand_series(
                &master,
                &overlay,
                range.start,
                range.end,
                self.config.expansion_limit,
            ) {
                Ok(instances) => {
                    for instance in instances {
                        if overlaps(&instance.event, range) {
                            produced.insert(instance.id.clone());
                            occurrences.push(instance);
                        }
                    }
                }
                Err(e) => {
                    warn!(series = %master.provider_id, error = %e, "skipping unexpandable series");
                }
            }
        }

        // Occurrences moved into the window from outside it: their
        // series expansion never visits the original start, so they are
        // picked up by their current position instead.
        for exception in self.exceptions.in_range(user, range.start, range.end).await? {
            if exception.event.status == EventStatus::Cancelled {
                continue;
            }
            let Some(id) = exception.exception_id() else {
                continue;
            };
            if produced.contains(&id) || !overlaps(&exception.event, range) {
                continue;
            }
            let master = self
                .events
                .find_by_provider_id(
                    exception.event.provider,
                    &exception.recurring_event_provider_id,
                    user,
                )
                .await?;
            occurrences.push(Occurrence {
                id,
                series_id: master.map(|m| m.id),
                original_start: exception.original_start.as_ref().map(|t| t.to_utc()),
                event: exception.event,
            });
        }

        occurrences.sort_by(|a, b| {
            let ka = a.event.start.as_ref().map(|t| t.to_utc());
            let kb = b.event.start.as_ref().map(|t| t.to_utc());
            ka.cmp(&kb).then_with(|| a.id.cmp(&b.id))
        });
        Ok(occurrences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventTime;
    use crate::provider::Provider;
    use crate::store::memory::{MemoryEventStore, MemoryExceptionStore};
    use chrono::TimeZone;

    fn jan(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn single(provider_id: &str, start: DateTime<Utc>) -> Event {
        let mut event = Event::new(Provider::Google, provider_id, "ana@example.com");
        event.id = Event::generate_id();
        event.title = Some(provider_id.to_string());
        event.start = Some(EventTime::utc(start));
        event.end = Some(EventTime::utc(start + Duration::hours(1)));
        event
    }

    fn master(provider_id: &str, start: DateTime<Utc>, rule: &str) -> Event {
        let mut event = single(provider_id, start);
        event.is_recurring = true;
        event.recurrence = Some(vec![rule.to_string()]);
        event
    }

    async fn materializer(
        events: Vec<Event>,
        exceptions: Vec<RecurringExceptionEvent>,
    ) -> RangeMaterializer {
        let event_store = Arc::new(MemoryEventStore::new());
        let exception_store = Arc::new(MemoryExceptionStore::new());
        event_store.bulk_upsert(&events).await.unwrap();
        exception_store.bulk_upsert(&exceptions).await.unwrap();
        RangeMaterializer::new(event_store, exception_store, SyncConfig::default())
    }

    #[tokio::test]
    async fn merges_singles_and_expanded_series_in_order() {
        let m = materializer(
            vec![
                single("lunch", jan(10, 12)),
                master("standup", jan(9, 9), "RRULE:FREQ=DAILY;COUNT=3"),
            ],
            vec![],
        )
        .await;

        let range = DateRange::new(jan(9, 0), jan(11, 23)).unwrap();
        let result = m.events_in_range("ana@example.com", &range).await.unwrap();

        let starts: Vec<DateTime<Utc>> = result
            .iter()
            .map(|o| o.event.start.as_ref().unwrap().to_utc())
            .collect();
        assert_eq!(starts, vec![jan(9, 9), jan(10, 9), jan(10, 12), jan(11, 9)]);
    }

    #[tokio::test]
    async fn instances_moved_out_of_the_window_disappear() {
        let series = master("standup", jan(9, 9), "RRULE:FREQ=DAILY;COUNT=3");
        let mut moved = RecurringExceptionEvent {
            event: series.clone(),
            recurring_event_provider_id: series.provider_id.clone(),
            original_start: Some(EventTime::utc(jan(10, 9))),
        };
        moved.event.is_recurring = false;
        moved.event.recurrence = None;
        moved.event.start = Some(EventTime::utc(jan(25, 9)));
        moved.event.end = Some(EventTime::utc(jan(25, 10)));

        let m = materializer(vec![series], vec![moved]).await;
        let range = DateRange::new(jan(9, 0), jan(11, 23)).unwrap();
        let result = m.events_in_range("ana@example.com", &range).await.unwrap();

        let starts: Vec<DateTime<Utc>> = result
            .iter()
            .map(|o| o.event.start.as_ref().unwrap().to_utc())
            .collect();
        assert_eq!(starts, vec![jan(9, 9), jan(11, 9)]);
    }

    #[tokio::test]
    async fn instances_moved_into_the_window_appear() {
        // Series over by Jan 3; one occurrence relocated to Jan 15.
        let mut series = master("retro", jan(1, 9), "RRULE:FREQ=DAILY;COUNT=3");
        series.recurrence_end = Some(jan(3, 10));

        let mut moved = RecurringExceptionEvent {
            event: series.clone(),
            recurring_event_provider_id: series.provider_id.clone(),
            original_start: Some(EventTime::utc(jan(2, 9))),
        };
        moved.event.is_recurring = false;
        moved.event.recurrence = None;
        moved.event.recurrence_end = None;
        moved.event.start = Some(EventTime::utc(jan(15, 9)));
        moved.event.end = Some(EventTime::utc(jan(15, 10)));

        let master_id = series.id.clone();
        let m = materializer(vec![series], vec![moved]).await;
        let range = DateRange::new(jan(14, 0), jan(16, 0)).unwrap();
        let result = m.events_in_range("ana@example.com", &range).await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].original_start, Some(jan(2, 9)));
        assert_eq!(result[0].series_id.as_deref(), Some(master_id.as_str()));
        assert_eq!(result[0].event.start.as_ref().unwrap().to_utc(), jan(15, 9));
    }

    #[tokio::test]
    async fn one_bad_series_does_not_break_the_window() {
        let mut broken = master("broken", jan(9, 9), "RRULE:FREQ=NEVERMORE");
        broken.recurrence_end = None;

        let m = materializer(
            vec![broken, master("standup", jan(9, 9), "RRULE:FREQ=DAILY;COUNT=2")],
            vec![],
        )
        .await;

        let range = DateRange::new(jan(9, 0), jan(11, 23)).unwrap();
        let result = m.events_in_range("ana@example.com", &range).await.unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        assert!(DateRange::new(jan(10, 0), jan(9, 0)).is_err());
        assert!(DateRange::new(jan(9, 0), jan(9, 0)).is_err());
    }
}
