//! Error handling for conscript-store
//!
//! Store failures surface as `DraftError::Persistence` so the engine can
//! propagate them unchanged; these helpers fill in the operation name.

use conscript_core::errors::DraftError;

pub use conscript_core::errors::Result;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> DraftError {
    DraftError::persistence(
        "migration",
        format!("Migration {} failed: {}", migration_id, reason),
    )
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> DraftError {
    DraftError::persistence(
        "migration_checksum",
        format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ),
    )
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> DraftError {
    DraftError::persistence("sqlite", err.to_string())
}
