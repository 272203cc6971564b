//! Conscript Core - draft/publish lifecycle for persisted records
//!
//! This crate provides everything needed to give a record type a draft
//! workflow, independent of any particular database:
//! - Polymorphic record model with attributes and named associations
//! - Draft registry: per-type association, ignored-attribute and policy settings
//! - Lifecycle engine: `create_draft`, `publish`, sibling cleanup, guarded saves
//! - Before/after hooks around each transition, run inside its transaction
//! - `RecordStore` persistence seam with an in-memory implementation
//! - Attachment janitor removing blobs orphaned by a publish
//!
//! The SQLite-backed store lives in `conscript-store`.

pub mod attachments;
pub mod errors;
pub mod guard;
pub mod hooks;
pub mod lifecycle;
pub mod logging_facility;
pub mod model;
pub mod registry;
pub mod store;

// Logging macros refer to `$crate::schema`
pub use conscript_core_types::schema;

pub use attachments::{AttachmentJanitor, BlobStore, MemoryBlobStore};
pub use errors::{DraftError, ExError, ExErrorKind, Result};
pub use guard::{DraftGuard, FieldError, FieldErrors, SaveOutcome};
pub use hooks::{Hook, HookContext, HookRegistry, Timing, Transition};
pub use lifecycle::{DraftEngine, Drafted};
pub use model::{Filter, Record, RecordId, RecordState};
pub use registry::{DraftConfig, DraftOptions, DraftRegistry};
pub use store::{transaction, MemoryStore, RecordStore};
