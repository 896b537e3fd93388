//! Incremental synchronization between providers and the store.

mod reconciler;

pub use reconciler::SyncReconciler;

use std::collections::BTreeSet;

use crate::store::UpsertSummary;

/// Counters from one completed sync pass.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// True when the pass ran as a full listing instead of a delta.
    pub full_listing: bool,
    pub pages: usize,
    pub events: UpsertSummary,
    pub exceptions: UpsertSummary,
    /// Changes dropped because the stored copy carried a newer
    /// provider-side modification time.
    pub stale_skipped: usize,
    /// Sections whose content changed in this pass.
    pub changed_sections: BTreeSet<String>,
}

impl SyncReport {
    /// True when the pass wrote anything at all.
    pub fn wrote_anything(&self) -> bool {
        self.events.written > 0 || self.exceptions.written > 0
    }
}
