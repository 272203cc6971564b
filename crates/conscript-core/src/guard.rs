//! Guard policy
//!
//! Blocks direct writes to an original while drafts of it exist, unless the
//! type allows updates with drafts. A violation is reported as a field-level
//! error on the save outcome; the write is skipped and no `Err` is raised.

use serde::Serialize;

use crate::errors::{ExErrorKind, Result};
use crate::model::{Filter, Record};
use crate::registry::DraftConfig;
use crate::store::RecordStore;

/// Field the guard reports its violation against
pub const DRAFTS_FIELD: &str = "drafts";

/// A validation failure scoped to one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub code: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, kind: ExErrorKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: kind.code(),
            message: message.into(),
        }
    }

    pub fn is_guard_violation(&self) -> bool {
        self.code == ExErrorKind::GuardViolation.code()
    }
}

/// Validation failures collected for one save
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Errors reported against one field
    pub fn on(&self, field: &str) -> Vec<&FieldError> {
        self.0.iter().filter(|e| e.field == field).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    pub fn has_guard_violation(&self) -> bool {
        self.0.iter().any(FieldError::is_guard_violation)
    }
}

/// Result of a guarded save
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// The record was written
    Saved,
    /// The write was refused; nothing was persisted
    Rejected(FieldErrors),
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved)
    }

    pub fn errors(&self) -> Option<&FieldErrors> {
        match self {
            SaveOutcome::Saved => None,
            SaveOutcome::Rejected(errors) => Some(errors),
        }
    }
}

/// Pre-persist check protecting originals that have drafts
#[derive(Debug, Clone, Copy, Default)]
pub struct DraftGuard;

impl DraftGuard {
    /// Check whether `record` may be written
    ///
    /// Drafts, unsaved records and types with `allow_update_with_drafts` are
    /// always allowed. Returns the violation, if any.
    ///
    /// # Errors
    ///
    /// Only store failures while counting drafts.
    pub fn check(
        &self,
        store: &dyn RecordStore,
        config: &DraftConfig,
        record: &Record,
    ) -> Result<Option<FieldError>> {
        if record.is_draft || config.allow_update_with_drafts {
            return Ok(None);
        }
        let Some(id) = record.id else {
            return Ok(None);
        };

        let drafts = store.count_where(&record.record_type, &Filter::drafts_of(id))?;
        if drafts == 0 {
            return Ok(None);
        }

        Ok(Some(FieldError::new(
            DRAFTS_FIELD,
            ExErrorKind::GuardViolation,
            format!(
                "cannot update {} {} while {} draft(s) exist",
                record.record_type, id, drafts
            ),
        )))
    }
}
