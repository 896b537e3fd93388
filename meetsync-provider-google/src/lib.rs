//! Google Calendar provider for meetsync.
//!
//! Implements the core [`ProviderAdapter`](meetsync_core::ProviderAdapter)
//! on top of the Calendar v3 `events.list` incremental-sync protocol: a
//! full listing hands out a `nextSyncToken`, later passes replay only
//! what changed since that token, and an expired token (HTTP 410) maps
//! to [`InvalidSyncToken`](meetsync_core::MeetsyncError::InvalidSyncToken)
//! so the reconciler can fall back to a fresh full listing.

mod api;
mod normalize;
mod status;
mod wire;

use async_trait::async_trait;
use meetsync_core::{
    Account, DeltaPage, DeltaRequest, MeetsyncResult, Provider, ProviderAdapter, SyncConfig,
};

use crate::api::{GOOGLE_API_BASE, GoogleApi};

pub use crate::status::{response_from_google, response_to_google};

/// Google Calendar backend.
pub struct GoogleAdapter {
    api: GoogleApi,
    config: SyncConfig,
}

impl GoogleAdapter {
    pub fn new(config: SyncConfig) -> Self {
        Self::with_base_url(config, GOOGLE_API_BASE)
    }

    /// Points the adapter at a different API root (tests).
    pub fn with_base_url(config: SyncConfig, base_url: &str) -> Self {
        GoogleAdapter {
            api: GoogleApi::new(base_url.to_string()),
            config,
        }
    }
}

#[async_trait]
impl ProviderAdapter for GoogleAdapter {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    async fn fetch_changes(
        &self,
        account: &Account,
        request: &DeltaRequest,
    ) -> MeetsyncResult<DeltaPage> {
        let page = self.api.list_events(account, request).await?;
        let changes = normalize::page_changes(page.items, account, self.config.expansion_limit);
        Ok(DeltaPage {
            changes,
            next_page_token: page.next_page_token,
            next_cursor: page.next_sync_token,
        })
    }
}
