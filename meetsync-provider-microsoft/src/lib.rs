//! Microsoft Graph provider for meetsync.
//!
//! Implements the core [`ProviderAdapter`](meetsync_core::ProviderAdapter)
//! on top of the `calendarView/delta` protocol. Continuation is
//! link-driven: mid-pass pages carry an `@odata.nextLink` whose
//! `$skiptoken` becomes the page token, and the final page's
//! `@odata.deltaLink` yields the `$deltatoken` persisted as the sync
//! cursor. Attachments are not inlined in the feed, so the adapter also
//! provides the [`AttachmentService`](meetsync_core::AttachmentService)
//! capability for the reconciler's conditional fetch.

mod api;
mod normalize;
mod status;
mod wire;

use async_trait::async_trait;
use meetsync_core::{
    Account, Attachment, AttachmentService, DeltaPage, DeltaRequest, MeetsyncResult, Provider,
    ProviderAdapter, SyncConfig,
};

use crate::api::{GRAPH_API_BASE, GraphApi};

pub use crate::status::{response_from_graph, response_to_graph};

/// Microsoft Graph calendar backend.
pub struct MicrosoftAdapter {
    api: GraphApi,
    config: SyncConfig,
}

impl MicrosoftAdapter {
    pub fn new(config: SyncConfig) -> Self {
        Self::with_base_url(config, GRAPH_API_BASE)
    }

    /// Points the adapter at a different API root (tests).
    pub fn with_base_url(config: SyncConfig, base_url: &str) -> Self {
        MicrosoftAdapter {
            api: GraphApi::new(base_url.to_string()),
            config,
        }
    }
}

#[async_trait]
impl ProviderAdapter for MicrosoftAdapter {
    fn provider(&self) -> Provider {
        Provider::Microsoft
    }

    async fn fetch_changes(
        &self,
        account: &Account,
        request: &DeltaRequest,
    ) -> MeetsyncResult<DeltaPage> {
        let page = self.api.delta_page(account, request).await?;
        let changes = normalize::page_changes(page.items, account, self.config.expansion_limit);
        Ok(DeltaPage {
            changes,
            next_page_token: page.next_page_token,
            next_cursor: page.next_cursor,
        })
    }

    fn attachment_service(&self) -> Option<&dyn AttachmentService> {
        Some(self)
    }
}

#[async_trait]
impl AttachmentService for MicrosoftAdapter {
    async fn list_attachments(
        &self,
        account: &Account,
        provider_event_id: &str,
    ) -> MeetsyncResult<Vec<Attachment>> {
        let response = self.api.list_attachments(account, provider_event_id).await?;
        Ok(normalize::attachments(response))
    }
}
