//! The sync reconciler.
//!
//! Drives one provider change feed into the store: pages through the
//! feed, normalizes each change, resolves identity and section
//! ownership against what is already stored, and bulk-writes the
//! result. The continuation cursor is persisted only after every page
//! of the pass has been written, so an interrupted pass replays from
//! the previous cursor; upserts are idempotent, which makes the replay
//! harmless.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::account::{Account, SyncCursor};
use crate::config::SyncConfig;
use crate::error::{MeetsyncError, MeetsyncResult};
use crate::event::{Event, EventStatus, RecurringExceptionEvent, SectionAssignment};
use crate::notify::ChangeNotifier;
use crate::provider::{
    ChangedEvent, DeltaRequest, EventChange, Provider, ProviderAdapter, SeriesLink,
};
use crate::section::Meetsection;
use crate::store::{AccountStore, EventStore, ExceptionStore, SectionStore, UpsertSummary};
use crate::sync::SyncReport;

/// Upper bound on pages per pass; a feed that keeps promising more is
/// treated as broken.
const MAX_PAGES: usize = 500;

/// Hands out one lock per (user, provider) so passes for the same
/// account never interleave.
#[derive(Default)]
struct AccountLocks {
    locks: Mutex<HashMap<(String, Provider), Arc<tokio::sync::Mutex<()>>>>,
}

impl AccountLocks {
    fn lock_for(&self, user: &str, provider: Provider) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry((user.to_string(), provider))
            .or_default()
            .clone()
    }
}

/// Section membership snapshot for one pass.
struct SectionContext {
    personal: Meetsection,
    /// Every section the syncing user belongs to.
    member_sections: Vec<Meetsection>,
}

impl SectionContext {
    /// Loads the user's sections, provisioning the personal section on
    /// first contact.
    async fn load(store: &dyn SectionStore, account: &Account) -> MeetsyncResult<Self> {
        let user = account.user.as_str();
        let personal = match store.personal_for_user(user).await? {
            Some(section) => section,
            None => {
                let section = Meetsection::personal(user, account.display_name.as_deref());
                info!(%user, section = %section.id, "provisioned personal section");
                store.insert(&section).await?;
                section
            }
        };
        let member_sections = store.with_member(user).await?;
        Ok(SectionContext {
            personal,
            member_sections,
        })
    }
}

/// Section assignments for a freshly discovered event.
///
/// An event organized by another member lands in the sections that
/// member shares with the syncing user; everything else goes to the
/// personal section.
fn assign_sections(event: &Event, user: &str, sections: &SectionContext) -> BTreeSet<SectionAssignment> {
    let organizer = event.organizer.as_deref().unwrap_or(user);

    if organizer != user {
        let shared: BTreeSet<SectionAssignment> = sections
            .member_sections
            .iter()
            .filter(|s| !s.is_personal() && s.has_member(organizer))
            .map(|s| SectionAssignment {
                section_id: s.id.clone(),
                owning_user_id: organizer.to_string(),
            })
            .collect();
        if !shared.is_empty() {
            return shared;
        }
    }

    BTreeSet::from([SectionAssignment {
        section_id: sections.personal.id.clone(),
        owning_user_id: user.to_string(),
    }])
}

/// Everything one page of changes resolves into.
#[derive(Default)]
struct NormalizedBatch {
    events: Vec<Event>,
    exceptions: Vec<RecurringExceptionEvent>,
    touched_sections: BTreeSet<String>,
    stale_skipped: usize,
}

pub struct SyncReconciler {
    events: Arc<dyn EventStore>,
    exceptions: Arc<dyn ExceptionStore>,
    accounts: Arc<dyn AccountStore>,
    sections: Arc<dyn SectionStore>,
    notifier: Arc<dyn ChangeNotifier>,
    config: SyncConfig,
    locks: AccountLocks,
}

impl SyncReconciler {
    pub fn new(
        events: Arc<dyn EventStore>,
        exceptions: Arc<dyn ExceptionStore>,
        accounts: Arc<dyn AccountStore>,
        sections: Arc<dyn SectionStore>,
        notifier: Arc<dyn ChangeNotifier>,
        config: SyncConfig,
    ) -> Self {
        SyncReconciler {
            events,
            exceptions,
            accounts,
            sections,
            notifier,
            config,
            locks: AccountLocks::default(),
        }
    }

    /// Runs one sync pass for the account, serialized per
    /// (user, provider).
    ///
    /// An invalidated cursor is recovered transparently: the stored
    /// cursor is dropped and the pass reruns as a full listing bounded
    /// below by the account's creation time.
    #[instrument(skip(self, adapter), fields(provider = %adapter.provider()))]
    pub async fn sync_account(
        &self,
        adapter: &dyn ProviderAdapter,
        user: &str,
    ) -> MeetsyncResult<SyncReport> {
        let provider = adapter.provider();
        let lock = self.locks.lock_for(user, provider);
        let _guard = lock.lock().await;

        let account = self
            .accounts
            .get(user, provider)
            .await?
            .ok_or_else(|| MeetsyncError::Store(format!("unknown account: {user} ({provider})")))?;

        let cursor = account.cursor.as_ref().map(|c| c.token.clone());
        match self.run_pass(adapter, &account, cursor).await {
            Err(MeetsyncError::InvalidSyncToken) => {
                info!(%user, "sync cursor invalidated, falling back to full listing");
                self.accounts.save_cursor(user, provider, None).await?;
                self.run_pass(adapter, &account, None).await
            }
            other => other,
        }
    }

    async fn run_pass(
        &self,
        adapter: &dyn ProviderAdapter,
        account: &Account,
        cursor: Option<String>,
    ) -> MeetsyncResult<SyncReport> {
        let sections = SectionContext::load(self.sections.as_ref(), account).await?;

        let mut report = SyncReport {
            full_listing: cursor.is_none(),
            ..SyncReport::default()
        };
        let mut page_token: Option<String> = None;
        let next_cursor;

        loop {
            report.pages += 1;
            if report.pages > MAX_PAGES {
                return Err(MeetsyncError::Provider(format!(
                    "change feed did not terminate within {MAX_PAGES} pages"
                )));
            }

            let request = DeltaRequest {
                cursor: cursor.clone(),
                page_token: page_token.take(),
                window_start: if cursor.is_none() {
                    Some(account.resync_window_start())
                } else {
                    None
                },
                window_end: None,
                page_size: self.config.page_size,
            };
            let page = adapter.fetch_changes(account, &request).await?;

            let batch = self
                .normalize_page(adapter, account, &sections, page.changes)
                .await?;
            report.stale_skipped += batch.stale_skipped;

            let (event_summary, exception_summary) = self.write_batch(&batch).await?;
            if event_summary.written + exception_summary.written > 0 {
                report.changed_sections.extend(batch.touched_sections);
            }
            report.events.absorb(event_summary);
            report.exceptions.absorb(exception_summary);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => {
                    next_cursor = page.next_cursor;
                    break;
                }
            }
        }

        if let Some(token) = next_cursor {
            self.accounts
                .save_cursor(&account.user, account.provider, Some(SyncCursor::new(token)))
                .await?;
        }

        if report.wrote_anything() && !report.changed_sections.is_empty() {
            self.notifier
                .sections_changed(&account.user, &report.changed_sections)
                .await;
        }

        debug!(
            pages = report.pages,
            written = report.events.written + report.exceptions.written,
            unchanged = report.events.unchanged + report.exceptions.unchanged,
            stale = report.stale_skipped,
            "sync pass complete"
        );
        Ok(report)
    }

    async fn normalize_page(
        &self,
        adapter: &dyn ProviderAdapter,
        account: &Account,
        sections: &SectionContext,
        changes: Vec<EventChange>,
    ) -> MeetsyncResult<NormalizedBatch> {
        let mut batch = NormalizedBatch::default();

        for change in changes {
            match change {
                EventChange::Removed { provider_id } => {
                    self.resolve_removal(account, &provider_id, &mut batch).await?;
                }
                EventChange::Upsert(changed) => {
                    self.resolve_upsert(adapter, account, sections, changed, &mut batch)
                        .await?;
                }
            }
        }

        Ok(batch)
    }

    /// Removal markers carry only a provider id; whichever collection
    /// knows the id gets the tombstone. Unknown ids still produce a
    /// minimal tombstone so a later full listing cannot resurrect them.
    async fn resolve_removal(
        &self,
        account: &Account,
        provider_id: &str,
        batch: &mut NormalizedBatch,
    ) -> MeetsyncResult<()> {
        if let Some(mut exception) = self
            .exceptions
            .find_by_provider_id(account.provider, provider_id, &account.user)
            .await?
        {
            exception.event.is_deleted = true;
            exception.event.status = EventStatus::Cancelled;
            batch
                .touched_sections
                .extend(exception.event.section_ids());
            batch.exceptions.push(exception);
            return Ok(());
        }

        if let Some(mut event) = self
            .events
            .find_by_provider_id(account.provider, provider_id, &account.user)
            .await?
        {
            event.is_deleted = true;
            event.status = EventStatus::Cancelled;
            batch.touched_sections.extend(event.section_ids());
            batch.events.push(event);
            return Ok(());
        }

        let mut tombstone = Event::new(account.provider, provider_id, &account.user);
        tombstone.id = Event::generate_id();
        tombstone.is_deleted = true;
        tombstone.status = EventStatus::Cancelled;
        batch.events.push(tombstone);
        Ok(())
    }

    async fn resolve_upsert(
        &self,
        adapter: &dyn ProviderAdapter,
        account: &Account,
        sections: &SectionContext,
        changed: ChangedEvent,
        batch: &mut NormalizedBatch,
    ) -> MeetsyncResult<()> {
        let ChangedEvent {
            mut event,
            series,
            needs_attachments,
        } = changed;

        match series {
            Some(link) => {
                let existing = self
                    .exceptions
                    .find_by_provider_id(account.provider, &event.provider_id, &account.user)
                    .await?;

                if let Some(existing) = &existing {
                    if is_stale(&event, &existing.event) {
                        debug!(provider_id = %event.provider_id, "skipping stale exception");
                        batch.stale_skipped += 1;
                        return Ok(());
                    }
                    event.meetsections = existing.event.meetsections.clone();
                } else {
                    event.meetsections = assign_sections(&event, &account.user, sections);
                }

                self.attach_files(adapter, account, needs_attachments, &mut event)
                    .await;
                batch.touched_sections.extend(event.section_ids());
                batch.exceptions.push(self.as_exception(event, link));
            }
            None => {
                let existing = self
                    .events
                    .find_by_provider_id(account.provider, &event.provider_id, &account.user)
                    .await?;

                match &existing {
                    Some(existing) => {
                        if is_stale(&event, existing) {
                            debug!(provider_id = %event.provider_id, "skipping stale change");
                            batch.stale_skipped += 1;
                            return Ok(());
                        }
                        // Identity and local assignments survive provider
                        // rewrites.
                        event.id = existing.id.clone();
                        event.created_at = existing.created_at;
                        event.meetsections = existing.meetsections.clone();
                    }
                    None => {
                        event.id = Event::generate_id();
                        event.meetsections = assign_sections(&event, &account.user, sections);
                    }
                }

                self.attach_files(adapter, account, needs_attachments, &mut event)
                    .await;
                batch.touched_sections.extend(event.section_ids());
                batch.events.push(event);
            }
        }

        Ok(())
    }

    fn as_exception(&self, event: Event, link: SeriesLink) -> RecurringExceptionEvent {
        RecurringExceptionEvent {
            event,
            recurring_event_provider_id: link.series_provider_id,
            original_start: link.original_start,
        }
    }

    /// Best-effort out-of-band attachment fetch; a failure leaves the
    /// event without attachments rather than failing the pass.
    async fn attach_files(
        &self,
        adapter: &dyn ProviderAdapter,
        account: &Account,
        needs_attachments: bool,
        event: &mut Event,
    ) {
        if !needs_attachments {
            return;
        }
        let Some(service) = adapter.attachment_service() else {
            return;
        };
        match service.list_attachments(account, &event.provider_id).await {
            Ok(attachments) => event.attachments = attachments,
            Err(e) => {
                warn!(provider_id = %event.provider_id, error = %e, "attachment fetch failed");
            }
        }
    }

    async fn write_batch(
        &self,
        batch: &NormalizedBatch,
    ) -> MeetsyncResult<(UpsertSummary, UpsertSummary)> {
        let events = if batch.events.is_empty() {
            UpsertSummary::default()
        } else {
            self.events.bulk_upsert(&batch.events).await?
        };
        let exceptions = if batch.exceptions.is_empty() {
            UpsertSummary::default()
        } else {
            self.exceptions.bulk_upsert(&batch.exceptions).await?
        };
        Ok((events, exceptions))
    }
}

/// A change is stale when the stored copy carries a strictly newer
/// provider modification time. Changes without timestamps are never
/// considered stale.
fn is_stale(incoming: &Event, stored: &Event) -> bool {
    match (incoming.updated, stored.updated) {
        (Some(new), Some(old)) => new < old,
        _ => false,
    }
}
