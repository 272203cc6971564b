//! Record store abstraction
//!
//! The draft engine never talks to a database directly. Everything it needs
//! from persistence goes through [`RecordStore`], which the SQLite store and
//! the in-memory [`MemoryStore`] both implement.

pub mod memory;

pub use memory::MemoryStore;

use crate::errors::Result;
use crate::model::{Filter, Record, RecordId};

/// Persistence primitives consumed by the draft engine
///
/// Implementations must give `begin`/`commit`/`rollback` nesting semantics:
/// a `begin` inside an open transaction opens a nested scope whose rollback
/// only discards the writes made since that `begin`.
pub trait RecordStore {
    /// Load a top-level record with all of its associations
    fn find(&self, record_type: &str, id: RecordId) -> Result<Option<Record>>;

    /// Insert or update a record and the associations it carries
    ///
    /// Assigns ids to the record and to any new children. Associations the
    /// record does not carry are left untouched in storage; members missing
    /// from a carried association are removed.
    fn persist(&mut self, record: &mut Record) -> Result<()>;

    /// Delete a record, its children and every draft cloned from it
    ///
    /// # Errors
    ///
    /// `NotPersisted` if the record has no id, `RecordNotFound` if the id is
    /// unknown to the store.
    fn delete(&mut self, record: &Record) -> Result<()>;

    /// Delete every matching top-level record, returning how many were removed
    fn delete_where(&mut self, record_type: &str, filter: &Filter) -> Result<usize>;

    /// Load every matching top-level record, ordered by id
    fn query_where(&self, record_type: &str, filter: &Filter) -> Result<Vec<Record>>;

    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Count matching records
    fn count_where(&self, record_type: &str, filter: &Filter) -> Result<usize> {
        Ok(self.query_where(record_type, filter)?.len())
    }
}

/// Run `f` inside a store transaction
///
/// Commits when `f` returns `Ok`. On `Err` the transaction is rolled back and
/// the original error is returned unchanged.
pub fn transaction<T, F>(store: &mut dyn RecordStore, f: F) -> Result<T>
where
    F: FnOnce(&mut dyn RecordStore) -> Result<T>,
{
    store.begin()?;
    match f(&mut *store) {
        Ok(value) => match store.commit() {
            Ok(()) => Ok(value),
            Err(err) => {
                if let Err(rollback_err) = store.rollback() {
                    tracing::warn!(error = %rollback_err, "rollback after failed commit also failed");
                }
                Err(err)
            }
        },
        Err(err) => {
            if let Err(rollback_err) = store.rollback() {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
