//! Repository layer persisting records to SQLite

pub mod sqlite_repo;

pub use sqlite_repo::SqliteRecordStore;
