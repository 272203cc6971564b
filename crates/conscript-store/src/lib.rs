//! Conscript Store - SQLite persistence for draftable records
//!
//! Provides:
//! - Connection management (`db`)
//! - Embedded, checksummed schema migrations
//! - `SqliteRecordStore`, a `RecordStore` implementation the draft engine
//!   can run its transitions against

pub mod db;
pub mod errors;
pub mod migrations;
pub mod repo;

pub use errors::Result;
pub use repo::SqliteRecordStore;
