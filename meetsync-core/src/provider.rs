//! Provider identity and the adapter seam.
//!
//! The reconciler talks to calendar backends exclusively through
//! [`ProviderAdapter`]; each backend crate supplies one implementation
//! that speaks its own wire protocol and normalizes payloads into
//! canonical events.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::error::{MeetsyncError, MeetsyncResult};
use crate::event::{Attachment, Event, EventTime};

/// Supported calendar backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Microsoft,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Google => write!(f, "google"),
            Provider::Microsoft => write!(f, "microsoft"),
        }
    }
}

impl FromStr for Provider {
    type Err = MeetsyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Provider::Google),
            "microsoft" => Ok(Provider::Microsoft),
            other => Err(MeetsyncError::Validation(format!(
                "Unknown provider: {other}"
            ))),
        }
    }
}

/// One page request against a provider's change feed.
#[derive(Debug, Clone, Default)]
pub struct DeltaRequest {
    /// Continuation cursor from the last completed pass. `None` asks
    /// for a full listing.
    pub cursor: Option<String>,
    /// Page position within the current pass.
    pub page_token: Option<String>,
    /// Listing window, honored on full listings only.
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub page_size: u32,
}

/// One page of normalized changes from a provider.
///
/// Exactly one of `next_page_token` (more pages in this pass) or
/// `next_cursor` (pass complete) is expected to be set.
#[derive(Debug, Clone)]
pub struct DeltaPage {
    pub changes: Vec<EventChange>,
    pub next_page_token: Option<String>,
    pub next_cursor: Option<String>,
}

/// A single normalized change from a provider's feed.
#[derive(Debug, Clone)]
pub enum EventChange {
    Upsert(ChangedEvent),
    /// Removal marker carrying only the provider's event id.
    Removed { provider_id: String },
}

/// An upserted event, with its series linkage when the payload was an
/// exception instance of a recurring series.
#[derive(Debug, Clone)]
pub struct ChangedEvent {
    pub event: Event,
    pub series: Option<SeriesLink>,
    /// Set when the provider reported attachments that need a separate
    /// fetch.
    pub needs_attachments: bool,
}

/// Ties an exception instance back to its master series.
#[derive(Debug, Clone)]
pub struct SeriesLink {
    pub series_provider_id: String,
    pub original_start: Option<EventTime>,
}

/// A calendar backend connection.
///
/// Fetches one page per call; the reconciler drives the paging loop and
/// owns cursor persistence. Implementations surface a revoked cursor as
/// [`MeetsyncError::InvalidSyncToken`] so the reconciler can fall back
/// to a full listing.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    async fn fetch_changes(
        &self,
        account: &Account,
        request: &DeltaRequest,
    ) -> MeetsyncResult<DeltaPage>;

    /// Attachment lookup for backends that deliver attachments out of
    /// band. Backends that inline them return `None`.
    fn attachment_service(&self) -> Option<&dyn AttachmentService> {
        None
    }
}

/// Out-of-band attachment listing (Microsoft-style backends).
#[async_trait]
pub trait AttachmentService: Send + Sync {
    async fn list_attachments(
        &self,
        account: &Account,
        provider_event_id: &str,
    ) -> MeetsyncResult<Vec<Attachment>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_round_trip() {
        for provider in [Provider::Google, Provider::Microsoft] {
            assert_eq!(provider.to_string().parse::<Provider>().unwrap(), provider);
        }
        assert!("caldav".parse::<Provider>().is_err());
    }

    #[test]
    fn provider_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Provider::Microsoft).unwrap(),
            "\"microsoft\""
        );
    }
}
