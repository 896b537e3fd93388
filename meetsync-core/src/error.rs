//! Error types for the meetsync ecosystem.

use thiserror::Error;

/// Errors that can occur in meetsync operations.
#[derive(Error, Debug)]
pub enum MeetsyncError {
    /// Malformed recurrence rule text or an invalid pattern/range form.
    /// Fails fast; the engine never silently substitutes a default.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An update named a field outside the entity's allow-list.
    #[error("Unknown field in update: {0}")]
    InvalidField(String),

    /// Provider rejected the request for a non-retryable reason.
    /// Aborts the sync pass without advancing the cursor.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Rate limit, 5xx or transport failure. Safe to retry on the next
    /// scheduled pass; the cursor is left untouched.
    #[error("Provider temporarily unavailable: {0}")]
    ProviderTransient(String),

    /// The provider reported the delta cursor as expired or unknown.
    /// The reconciler consumes this internally by falling back to a full
    /// resync; callers should never observe it.
    #[error("Sync cursor invalidated by provider")]
    InvalidSyncToken,

    /// Credentials expired or were revoked. Surfaced so the caller can
    /// run its re-authentication flow.
    #[error("Provider authentication failed: {0}")]
    ProviderAuth(String),

    /// Backing store failure.
    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MeetsyncError {
    /// Whether a failed sync pass may be retried as-is on the next run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MeetsyncError::ProviderTransient(_))
    }
}

/// Result type alias for meetsync operations.
pub type MeetsyncResult<T> = Result<T, MeetsyncError>;
