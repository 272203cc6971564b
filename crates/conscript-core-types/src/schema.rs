//! Canonical schema constants for structured logging and events
//!
//! These constants keep field names identical across the engine, the
//! stores and the log capture used in tests.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Record identifiers
pub const FIELD_RECORD_TYPE: &str = "record_type";
pub const FIELD_RECORD_ID: &str = "record_id";
pub const FIELD_PARENT_ID: &str = "parent_id";
pub const FIELD_DRAFT_ID: &str = "draft_id";
pub const FIELD_TARGET_ID: &str = "target_id";

// Counts and outcomes
pub const FIELD_DESTROYED: &str = "destroyed";
pub const FIELD_SAVED: &str = "saved";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
