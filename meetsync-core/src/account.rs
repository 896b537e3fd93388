//! Connected provider accounts and their sync cursors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::Provider;

/// A calendar account connected by a user.
///
/// One account maps to one provider calendar; the sync reconciler runs
/// per account and stores its continuation cursor here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// The account email, which doubles as the owning user id.
    pub user: String,
    /// Name shown in the UI; seeds the personal section's name.
    pub display_name: Option<String>,
    pub provider: Provider,
    /// When the account was connected. Seeds the lower window bound of a
    /// full resync so we never backfill before the account existed.
    pub created_at: DateTime<Utc>,
    /// Ready bearer token for the provider's API. Acquisition and
    /// refresh happen outside this crate.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub access_token: String,
    /// Continuation cursor from the last completed sync pass, absent
    /// before the first pass and after invalidation.
    pub cursor: Option<SyncCursor>,
}

impl Account {
    pub fn new(user: &str, provider: Provider, created_at: DateTime<Utc>) -> Self {
        Account {
            user: user.to_string(),
            display_name: None,
            provider,
            created_at,
            access_token: String::new(),
            cursor: None,
        }
    }

    pub fn with_display_name(mut self, name: &str) -> Self {
        self.display_name = Some(name.to_string());
        self
    }

    pub fn with_access_token(mut self, token: &str) -> Self {
        self.access_token = token.to_string();
        self
    }

    /// Lower time bound for a full (non-incremental) listing.
    pub fn resync_window_start(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Opaque provider continuation token plus when we stored it.
///
/// The token's shape is provider-defined (a `syncToken` or a delta
/// link); the reconciler treats it as a black box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCursor {
    pub token: String,
    pub updated_at: DateTime<Utc>,
}

impl SyncCursor {
    pub fn new(token: String) -> Self {
        SyncCursor {
            token,
            updated_at: Utc::now(),
        }
    }
}
