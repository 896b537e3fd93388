//! Core engine for the meetsync calendar backend.
//!
//! This crate holds everything provider-independent:
//! - the canonical `Event` model, exceptions and occurrence identity
//! - the recurrence engine (RRULE evaluation and pattern translation)
//! - the sync reconciler that folds provider change feeds into the store
//! - the date-range materializer that expands series into occurrences
//!
//! Provider crates implement [`provider::ProviderAdapter`] on top of
//! their own wire clients and plug into the reconciler.

pub mod account;
pub mod config;
pub mod error;
pub mod event;
pub mod notify;
pub mod occurrence;
pub mod overlay;
pub mod patch;
pub mod provider;
pub mod range;
pub mod recurrence;
pub mod section;
pub mod store;
pub mod sync;

// Re-export the everyday types at the crate root.
pub use account::{Account, SyncCursor};
pub use config::SyncConfig;
pub use error::{MeetsyncError, MeetsyncResult};
pub use event::{
    Attachment, Attendee, Event, EventStatus, EventTime, RecurringExceptionEvent,
    ResponseStatus, SectionAssignment, Transparency,
};
pub use occurrence::{Occurrence, OccurrenceKey};
pub use provider::{
    AttachmentService, ChangedEvent, DeltaPage, DeltaRequest, EventChange, Provider,
    ProviderAdapter, SeriesLink,
};
pub use range::{DateRange, RangeMaterializer};
pub use section::Meetsection;
pub use sync::{SyncReconciler, SyncReport};
