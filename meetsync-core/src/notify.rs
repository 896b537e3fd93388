//! Change notification fan-out.

use std::collections::BTreeSet;

use async_trait::async_trait;

/// Receives section-level change signals after a sync pass commits.
///
/// Notification is strictly best-effort: implementations swallow their
/// own delivery failures, and the reconciler never fails a pass over
/// them.
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    /// One call per completed pass that wrote anything, carrying every
    /// section touched by the batch.
    async fn sections_changed(&self, user: &str, section_ids: &BTreeSet<String>);
}

/// Discards all notifications.
pub struct NullNotifier;

#[async_trait]
impl ChangeNotifier for NullNotifier {
    async fn sections_changed(&self, _user: &str, _section_ids: &BTreeSet<String>) {}
}
