//! In-memory store implementations.
//!
//! Reference semantics for the store traits, used by the test suite and
//! by single-process deployments that do not need durability.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::account::{Account, SyncCursor};
use crate::error::{MeetsyncError, MeetsyncResult};
use crate::event::{Event, RecurringExceptionEvent};
use crate::provider::Provider;
use crate::section::Meetsection;
use crate::store::{
    AccountStore, EventStore, ExceptionStore, SectionStore, UpsertSummary,
};

type ProviderKey = (Provider, String, String);

fn provider_key(provider: Provider, provider_id: &str, user: &str) -> ProviderKey {
    (provider, provider_id.to_string(), user.to_string())
}

#[derive(Default)]
pub struct MemoryEventStore {
    events: RwLock<HashMap<String, Event>>,
    by_provider: RwLock<HashMap<ProviderKey, String>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn get(&self, id: &str) -> MeetsyncResult<Option<Event>> {
        Ok(self.events.read().get(id).cloned())
    }

    async fn find_by_provider_id(
        &self,
        provider: Provider,
        provider_id: &str,
        user: &str,
    ) -> MeetsyncResult<Option<Event>> {
        let key = provider_key(provider, provider_id, user);
        let id = match self.by_provider.read().get(&key) {
            Some(id) => id.clone(),
            None => return Ok(None),
        };
        Ok(self.events.read().get(&id).cloned())
    }

    async fn bulk_upsert(&self, events: &[Event]) -> MeetsyncResult<UpsertSummary> {
        let now = Utc::now();
        let mut summary = UpsertSummary::default();

        for event in events {
            if let Err(e) = event.validate() {
                debug!(provider_id = %event.provider_id, error = %e, "dropping invalid event");
                summary.failed += 1;
                continue;
            }

            let key = provider_key(event.provider, &event.provider_id, &event.user);
            let existing_id = self.by_provider.read().get(&key).cloned();
            let existing = existing_id.and_then(|id| self.events.read().get(&id).cloned());

            if let Some(existing) = &existing {
                if existing.same_content(event) {
                    summary.unchanged += 1;
                    continue;
                }
            }

            let mut stored = event.clone();
            stored.created_at = existing
                .as_ref()
                .and_then(|e| e.created_at)
                .or(Some(now));
            stored.updated_at = Some(now);

            if let Some(existing) = &existing {
                if existing.id != stored.id {
                    self.events.write().remove(&existing.id);
                }
            }
            self.by_provider.write().insert(key, stored.id.clone());
            self.events.write().insert(stored.id.clone(), stored);
            summary.written += 1;
        }

        Ok(summary)
    }

    async fn singles_in_range(
        &self,
        user: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> MeetsyncResult<Vec<Event>> {
        let mut result: Vec<Event> = self
            .events
            .read()
            .values()
            .filter(|e| e.user == user && !e.is_recurring && !e.is_deleted)
            .filter(|e| {
                let Some(event_start) = e.start.as_ref().map(|t| t.to_utc()) else {
                    return false;
                };
                let event_end = e.end.as_ref().map(|t| t.to_utc()).unwrap_or(event_start);
                event_start <= end && event_end >= start
            })
            .cloned()
            .collect();
        result.sort_by_key(|e| e.start.as_ref().map(|t| t.to_utc()));
        Ok(result)
    }

    async fn masters_in_range(
        &self,
        user: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> MeetsyncResult<Vec<Event>> {
        let mut result: Vec<Event> = self
            .events
            .read()
            .values()
            .filter(|e| e.user == user && e.is_recurring && !e.is_deleted)
            .filter(|e| {
                let Some(series_start) = e.start.as_ref().map(|t| t.to_utc()) else {
                    return false;
                };
                series_start <= end && e.recurrence_end.is_none_or(|re| re >= start)
            })
            .cloned()
            .collect();
        result.sort_by_key(|e| e.start.as_ref().map(|t| t.to_utc()));
        Ok(result)
    }
}

#[derive(Default)]
pub struct MemoryExceptionStore {
    exceptions: RwLock<HashMap<String, RecurringExceptionEvent>>,
    by_provider: RwLock<HashMap<ProviderKey, String>>,
}

impl MemoryExceptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExceptionStore for MemoryExceptionStore {
    async fn get(&self, id: &str) -> MeetsyncResult<Option<RecurringExceptionEvent>> {
        Ok(self.exceptions.read().get(id).cloned())
    }

    async fn find_by_provider_id(
        &self,
        provider: Provider,
        provider_id: &str,
        user: &str,
    ) -> MeetsyncResult<Option<RecurringExceptionEvent>> {
        let key = provider_key(provider, provider_id, user);
        let id = match self.by_provider.read().get(&key) {
            Some(id) => id.clone(),
            None => return Ok(None),
        };
        Ok(self.exceptions.read().get(&id).cloned())
    }

    async fn bulk_upsert(
        &self,
        exceptions: &[RecurringExceptionEvent],
    ) -> MeetsyncResult<UpsertSummary> {
        let now = Utc::now();
        let mut summary = UpsertSummary::default();

        for exception in exceptions {
            let Some(id) = exception.exception_id() else {
                debug!(
                    provider_id = %exception.event.provider_id,
                    "dropping exception without an original start"
                );
                summary.failed += 1;
                continue;
            };

            let key = provider_key(
                exception.event.provider,
                &exception.event.provider_id,
                &exception.event.user,
            );
            let existing = self.exceptions.read().get(&id).cloned();

            // The canonical key is the document id, whatever the caller
            // put in the id field.
            let mut stored = exception.clone();
            stored.event.id = id.clone();

            if let Some(existing) = &existing {
                if existing.event.same_content(&stored.event)
                    && existing.original_start == stored.original_start
                {
                    summary.unchanged += 1;
                    continue;
                }
            }

            stored.event.created_at = existing
                .as_ref()
                .and_then(|e| e.event.created_at)
                .or(Some(now));
            stored.event.updated_at = Some(now);

            self.by_provider.write().insert(key, id.clone());
            self.exceptions.write().insert(id, stored);
            summary.written += 1;
        }

        Ok(summary)
    }

    async fn for_series(
        &self,
        user: &str,
        series_provider_id: &str,
    ) -> MeetsyncResult<Vec<RecurringExceptionEvent>> {
        let mut result: Vec<RecurringExceptionEvent> = self
            .exceptions
            .read()
            .values()
            .filter(|e| {
                e.event.user == user && e.recurring_event_provider_id == series_provider_id
            })
            .cloned()
            .collect();
        result.sort_by_key(|e| e.original_start.as_ref().map(|t| t.to_utc()));
        Ok(result)
    }

    async fn in_range(
        &self,
        user: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> MeetsyncResult<Vec<RecurringExceptionEvent>> {
        let mut result: Vec<RecurringExceptionEvent> = self
            .exceptions
            .read()
            .values()
            .filter(|e| e.event.user == user && !e.event.is_deleted)
            .filter(|e| {
                let Some(event_start) = e.event.start.as_ref().map(|t| t.to_utc()) else {
                    return false;
                };
                let event_end = e
                    .event
                    .end
                    .as_ref()
                    .map(|t| t.to_utc())
                    .unwrap_or(event_start);
                event_start <= end && event_end >= start
            })
            .cloned()
            .collect();
        result.sort_by_key(|e| e.event.start.as_ref().map(|t| t.to_utc()));
        Ok(result)
    }
}

#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<(String, Provider), Account>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn get(&self, user: &str, provider: Provider) -> MeetsyncResult<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .get(&(user.to_string(), provider))
            .cloned())
    }

    async fn upsert(&self, account: &Account) -> MeetsyncResult<()> {
        self.accounts
            .write()
            .insert((account.user.clone(), account.provider), account.clone());
        Ok(())
    }

    async fn save_cursor(
        &self,
        user: &str,
        provider: Provider,
        cursor: Option<SyncCursor>,
    ) -> MeetsyncResult<()> {
        let mut accounts = self.accounts.write();
        let account = accounts
            .get_mut(&(user.to_string(), provider))
            .ok_or_else(|| {
                MeetsyncError::Store(format!("unknown account: {user} ({provider})"))
            })?;
        account.cursor = cursor;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySectionStore {
    sections: RwLock<HashMap<String, Meetsection>>,
}

impl MemorySectionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SectionStore for MemorySectionStore {
    async fn get(&self, id: &str) -> MeetsyncResult<Option<Meetsection>> {
        Ok(self.sections.read().get(id).cloned())
    }

    async fn personal_for_user(&self, user: &str) -> MeetsyncResult<Option<Meetsection>> {
        Ok(self
            .sections
            .read()
            .values()
            .find(|s| s.is_personal() && s.has_member(user))
            .cloned())
    }

    async fn with_member(&self, user: &str) -> MeetsyncResult<Vec<Meetsection>> {
        let mut result: Vec<Meetsection> = self
            .sections
            .read()
            .values()
            .filter(|s| s.has_member(user))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(result)
    }

    async fn insert(&self, section: &Meetsection) -> MeetsyncResult<()> {
        self.sections
            .write()
            .insert(section.id.clone(), section.clone());
        Ok(())
    }
}
