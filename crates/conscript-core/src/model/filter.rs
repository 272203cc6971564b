use serde_json::Value;

use super::record::{Record, RecordId};

/// Predicate over top-level records of one type
///
/// Every set criterion must hold for a record to match; an empty filter
/// matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub is_draft: Option<bool>,
    pub draft_parent_id: Option<RecordId>,
    pub attributes: Vec<(String, Value)>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Records that are not drafts
    pub fn published() -> Self {
        Self {
            is_draft: Some(false),
            ..Self::default()
        }
    }

    /// Drafts of any lineage, including new-record drafts
    pub fn drafts() -> Self {
        Self {
            is_draft: Some(true),
            ..Self::default()
        }
    }

    /// Drafts cloned from the given original
    pub fn drafts_of(parent_id: RecordId) -> Self {
        Self {
            is_draft: Some(true),
            draft_parent_id: Some(parent_id),
            ..Self::default()
        }
    }

    /// Add an attribute equality criterion
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// True if the filter only constrains structural columns
    pub fn is_structural(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        if let Some(is_draft) = self.is_draft {
            if record.is_draft != is_draft {
                return false;
            }
        }
        if let Some(parent_id) = self.draft_parent_id {
            if record.draft_parent_id != Some(parent_id) {
                return false;
            }
        }
        self.attributes
            .iter()
            .all(|(name, value)| record.get(name) == Some(value))
    }
}
