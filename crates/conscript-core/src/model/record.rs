use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Store-assigned record identifier
pub type RecordId = i64;

/// Names that describe a record's identity and lineage rather than its content.
///
/// These are never copied from a draft onto its original, whatever the
/// registry says.
pub const STRUCTURAL_ATTRIBUTES: [&str; 6] = [
    "id",
    "record_type",
    "created_at",
    "updated_at",
    "draft_parent_id",
    "is_draft",
];

/// Lifecycle state of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordState {
    Published,
    Draft,
}

/// Record - a persisted entity of any configured type
///
/// Attributes are free-form JSON values keyed by field name. Associations are
/// named collections of child records that the owning record persists along
/// with itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Type discriminator, used to look up draft configuration
    pub record_type: String,

    /// Identifier assigned by the store on first persist
    pub id: Option<RecordId>,

    /// True for draft copies and new-record drafts
    pub is_draft: bool,

    /// Original this draft was cloned from (None for originals and new-record drafts)
    pub draft_parent_id: Option<RecordId>,

    /// Persisted field values
    pub attributes: BTreeMap<String, Value>,

    /// Named child collections
    pub associations: BTreeMap<String, Vec<Record>>,

    /// Set by the store on insert
    pub created_at: Option<DateTime<Utc>>,

    /// Set by the store on every write
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
    /// Create a new, unpersisted, published record
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            id: None,
            is_draft: false,
            draft_parent_id: None,
            attributes: BTreeMap::new(),
            associations: BTreeMap::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Builder-style attribute setter
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Builder-style association setter
    pub fn with_association(mut self, name: impl Into<String>, children: Vec<Record>) -> Self {
        self.associations.insert(name.into(), children);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Convenience accessor for string attributes
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    /// Members of an association; empty when the association is not loaded
    pub fn association(&self, name: &str) -> &[Record] {
        self.associations
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Mutable access to an association, creating it empty if absent
    pub fn association_mut(&mut self, name: &str) -> &mut Vec<Record> {
        self.associations.entry(name.to_string()).or_default()
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn state(&self) -> RecordState {
        if self.is_draft {
            RecordState::Draft
        } else {
            RecordState::Published
        }
    }

    /// Check if this is a draft with no published counterpart
    pub fn is_new_record_draft(&self) -> bool {
        self.is_draft && self.draft_parent_id.is_none()
    }

    /// Structural duplicate with a fresh identity
    ///
    /// Attributes and lineage flags are copied. Only the named associations
    /// are carried over, and each of their members is itself duplicated so no
    /// child record is shared between the source and the copy.
    pub fn duplicate<'a, I>(&self, include: I) -> Record
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut associations = BTreeMap::new();
        for name in include {
            let children = self
                .association(name)
                .iter()
                .map(Record::deep_copy)
                .collect();
            associations.insert(name.to_string(), children);
        }

        Record {
            record_type: self.record_type.clone(),
            id: None,
            is_draft: self.is_draft,
            draft_parent_id: self.draft_parent_id,
            attributes: self.attributes.clone(),
            associations,
            created_at: None,
            updated_at: None,
        }
    }

    /// Copy of this record and every nested child, all with fresh identities
    fn deep_copy(&self) -> Record {
        let names: Vec<&str> = self.associations.keys().map(String::as_str).collect();
        self.duplicate(names)
    }
}
