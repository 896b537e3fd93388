//! Persistence seam.
//!
//! The engine reads and writes through these traits; the host
//! application brings its own backing store. [`memory`] contains the
//! in-memory implementation used by tests and small deployments.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::account::{Account, SyncCursor};
use crate::error::MeetsyncResult;
use crate::event::{Event, RecurringExceptionEvent};
use crate::provider::Provider;
use crate::section::Meetsection;

/// Counters reported by a bulk upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    /// Documents inserted or overwritten.
    pub written: usize,
    /// Documents skipped because the stored copy already matched.
    pub unchanged: usize,
    /// Documents rejected individually; the rest of the batch went
    /// through.
    pub failed: usize,
}

impl UpsertSummary {
    pub fn absorb(&mut self, other: UpsertSummary) {
        self.written += other.written;
        self.unchanged += other.unchanged;
        self.failed += other.failed;
    }
}

/// Storage for canonical events.
///
/// `(provider, provider_id, user)` is the upsert identity; replaying a
/// batch must leave the store unchanged.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn get(&self, id: &str) -> MeetsyncResult<Option<Event>>;

    async fn find_by_provider_id(
        &self,
        provider: Provider,
        provider_id: &str,
        user: &str,
    ) -> MeetsyncResult<Option<Event>>;

    /// Unordered write of a batch. A document failing on its own must
    /// not abort the rest; failures are tallied in the summary.
    async fn bulk_upsert(&self, events: &[Event]) -> MeetsyncResult<UpsertSummary>;

    /// Live non-recurring events whose span intersects the inclusive
    /// range.
    async fn singles_in_range(
        &self,
        user: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> MeetsyncResult<Vec<Event>>;

    /// Live recurring masters whose series could produce occurrences in
    /// the inclusive range: first start at or before `end`, and either
    /// unbounded or ending at/after `start`.
    async fn masters_in_range(
        &self,
        user: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> MeetsyncResult<Vec<Event>>;
}

/// Storage for per-occurrence exception records, kept apart from the
/// events so series expansion can fetch exactly the overlay it needs.
#[async_trait]
pub trait ExceptionStore: Send + Sync {
    async fn get(&self, id: &str) -> MeetsyncResult<Option<RecurringExceptionEvent>>;

    async fn find_by_provider_id(
        &self,
        provider: Provider,
        provider_id: &str,
        user: &str,
    ) -> MeetsyncResult<Option<RecurringExceptionEvent>>;

    async fn bulk_upsert(
        &self,
        exceptions: &[RecurringExceptionEvent],
    ) -> MeetsyncResult<UpsertSummary>;

    /// All exception records of one series, cancelled ones included.
    async fn for_series(
        &self,
        user: &str,
        series_provider_id: &str,
    ) -> MeetsyncResult<Vec<RecurringExceptionEvent>>;

    /// Exceptions whose current span intersects the inclusive range,
    /// regardless of where their original start lies. Catches
    /// occurrences that were moved into a window their series does not
    /// otherwise reach.
    async fn in_range(
        &self,
        user: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> MeetsyncResult<Vec<RecurringExceptionEvent>>;
}

/// Storage for connected accounts and their sync cursors.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, user: &str, provider: Provider) -> MeetsyncResult<Option<Account>>;

    async fn upsert(&self, account: &Account) -> MeetsyncResult<()>;

    /// Replaces the account's cursor. `None` clears it, forcing the
    /// next pass to run a full listing.
    async fn save_cursor(
        &self,
        user: &str,
        provider: Provider,
        cursor: Option<SyncCursor>,
    ) -> MeetsyncResult<()>;
}

/// Storage for meetsections.
#[async_trait]
pub trait SectionStore: Send + Sync {
    async fn get(&self, id: &str) -> MeetsyncResult<Option<Meetsection>>;

    /// The user's system-created personal section.
    async fn personal_for_user(&self, user: &str) -> MeetsyncResult<Option<Meetsection>>;

    /// Every section the user is a member of.
    async fn with_member(&self, user: &str) -> MeetsyncResult<Vec<Meetsection>>;

    async fn insert(&self, section: &Meetsection) -> MeetsyncResult<()>;
}
