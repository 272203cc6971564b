use std::collections::BTreeMap;

use chrono::Utc;

use super::RecordStore;
use crate::errors::{DraftError, Result};
use crate::model::{Filter, Record, RecordId};

/// In-memory record store
///
/// A BTreeMap of top-level records, each holding its children inline.
/// Transactions are a stack of snapshots: `begin` clones the current map and
/// `rollback` restores it. Not thread-safe; intended for tests and for
/// embedding the engine without a database.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: BTreeMap<RecordId, Record>,
    next_id: RecordId,
    snapshots: Vec<BTreeMap<RecordId, Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of top-level records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check if a top-level record with this id exists, whatever its type
    pub fn contains(&self, id: RecordId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn in_transaction(&self) -> bool {
        !self.snapshots.is_empty()
    }

    fn allocate_id(&mut self) -> RecordId {
        self.next_id += 1;
        self.next_id
    }

    /// Give ids and timestamps to the record and every child that lacks them
    fn stamp(&mut self, record: &mut Record) {
        let now = Utc::now();
        if record.id.is_none() {
            record.id = Some(self.allocate_id());
            record.created_at = Some(now);
        }
        record.updated_at = Some(now);
        for children in record.associations.values_mut() {
            for child in children.iter_mut() {
                self.stamp(child);
            }
        }
    }

    /// Remove a record and, transitively, every draft cloned from it
    fn remove_cascading(&mut self, id: RecordId) -> usize {
        if self.records.remove(&id).is_none() {
            return 0;
        }
        let drafts: Vec<RecordId> = self
            .records
            .values()
            .filter(|r| r.draft_parent_id == Some(id))
            .filter_map(|r| r.id)
            .collect();
        1 + drafts
            .into_iter()
            .map(|draft_id| self.remove_cascading(draft_id))
            .sum::<usize>()
    }
}

impl RecordStore for MemoryStore {
    fn find(&self, record_type: &str, id: RecordId) -> Result<Option<Record>> {
        Ok(self
            .records
            .get(&id)
            .filter(|r| r.record_type == record_type)
            .cloned())
    }

    fn persist(&mut self, record: &mut Record) -> Result<()> {
        if let Some(id) = record.id {
            let same_type = self
                .records
                .get(&id)
                .is_some_and(|r| r.record_type == record.record_type);
            if !same_type {
                return Err(DraftError::RecordNotFound {
                    record_type: record.record_type.clone(),
                    record_id: id,
                });
            }
        }

        self.stamp(record);
        let id = record.id.ok_or_else(|| DraftError::Internal {
            message: "record id missing after stamping".to_string(),
        })?;

        let mut stored = record.clone();
        if let Some(previous) = self.records.remove(&id) {
            // Associations the caller did not carry stay as they were
            for (name, children) in previous.associations {
                stored.associations.entry(name).or_insert(children);
            }
            stored.created_at = previous.created_at;
            record.created_at = previous.created_at;
        }
        self.records.insert(id, stored);
        Ok(())
    }

    fn delete(&mut self, record: &Record) -> Result<()> {
        let id = record.id.ok_or_else(|| DraftError::NotPersisted {
            record_type: record.record_type.clone(),
        })?;
        let exists = self
            .records
            .get(&id)
            .is_some_and(|r| r.record_type == record.record_type);
        if !exists {
            return Err(DraftError::RecordNotFound {
                record_type: record.record_type.clone(),
                record_id: id,
            });
        }
        self.remove_cascading(id);
        Ok(())
    }

    fn delete_where(&mut self, record_type: &str, filter: &Filter) -> Result<usize> {
        let ids: Vec<RecordId> = self
            .query_where(record_type, filter)?
            .into_iter()
            .filter_map(|r| r.id)
            .collect();
        let mut removed = 0;
        for id in ids {
            // A cascade from an earlier id may already have removed this one
            if self.records.contains_key(&id) {
                self.remove_cascading(id);
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn query_where(&self, record_type: &str, filter: &Filter) -> Result<Vec<Record>> {
        Ok(self
            .records
            .values()
            .filter(|r| r.record_type == record_type && filter.matches(r))
            .cloned()
            .collect())
    }

    fn begin(&mut self) -> Result<()> {
        self.snapshots.push(self.records.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.snapshots
            .pop()
            .map(|_| ())
            .ok_or_else(|| DraftError::Transaction {
                message: "commit without an open transaction".to_string(),
            })
    }

    fn rollback(&mut self) -> Result<()> {
        let snapshot = self.snapshots.pop().ok_or_else(|| DraftError::Transaction {
            message: "rollback without an open transaction".to_string(),
        })?;
        self.records = snapshot;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert!(!store.in_transaction());
    }

    #[test]
    fn test_persist_assigns_ids_to_record_and_children() {
        let mut store = MemoryStore::new();
        let mut record = Record::new("widget")
            .with_attribute("name", "Gear")
            .with_association("items", vec![Record::new("item")]);

        store.persist(&mut record).unwrap();

        assert!(record.id.is_some());
        assert!(record.created_at.is_some());
        assert!(record.association("items")[0].id.is_some());
        assert_ne!(record.id, record.association("items")[0].id);

        let loaded = store.find("widget", record.id.unwrap()).unwrap().unwrap();
        assert_eq!(loaded.get_str("name"), Some("Gear"));
    }

    #[test]
    fn test_find_checks_record_type() {
        let mut store = MemoryStore::new();
        let mut record = Record::new("widget");
        store.persist(&mut record).unwrap();

        assert!(store.find("gadget", record.id.unwrap()).unwrap().is_none());
    }

    #[test]
    fn test_persist_keeps_uncarried_associations() {
        let mut store = MemoryStore::new();
        let mut record =
            Record::new("widget").with_association("items", vec![Record::new("item")]);
        store.persist(&mut record).unwrap();
        let id = record.id.unwrap();

        let mut partial = store.find("widget", id).unwrap().unwrap();
        partial.associations.clear();
        partial.set("name", "Renamed");
        store.persist(&mut partial).unwrap();

        let loaded = store.find("widget", id).unwrap().unwrap();
        assert_eq!(loaded.association("items").len(), 1);
        assert_eq!(loaded.get_str("name"), Some("Renamed"));
    }

    #[test]
    fn test_persist_unknown_id_fails() {
        let mut store = MemoryStore::new();
        let mut record = Record::new("widget");
        record.id = Some(99);

        let result = store.persist(&mut record);
        assert!(matches!(result, Err(DraftError::RecordNotFound { .. })));

        let mut widget = Record::new("widget").with_attribute("name", "kept");
        store.persist(&mut widget).unwrap();
        let mut gadget = Record::new("gadget");
        gadget.id = widget.id;

        let result = store.persist(&mut gadget);
        assert!(matches!(result, Err(DraftError::RecordNotFound { .. })));
        let stored = store.find("widget", widget.id.unwrap()).unwrap().unwrap();
        assert_eq!(stored.get_str("name"), Some("kept"));
    }

    #[test]
    fn test_delete_cascades_to_drafts() {
        let mut store = MemoryStore::new();
        let mut original = Record::new("widget");
        store.persist(&mut original).unwrap();

        let mut draft = original.duplicate([]);
        draft.is_draft = true;
        draft.draft_parent_id = original.id;
        store.persist(&mut draft).unwrap();

        store.delete(&original).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_unpersisted_and_missing() {
        let mut store = MemoryStore::new();
        let unsaved = Record::new("widget");
        assert!(matches!(
            store.delete(&unsaved),
            Err(DraftError::NotPersisted { .. })
        ));

        let mut ghost = Record::new("widget");
        ghost.id = Some(5);
        assert!(matches!(
            store.delete(&ghost),
            Err(DraftError::RecordNotFound { .. })
        ));
    }

    #[test]
    fn test_delete_where_counts_matches() {
        let mut store = MemoryStore::new();
        for name in ["a", "b", "c"] {
            let mut record = Record::new("widget").with_attribute("name", name);
            store.persist(&mut record).unwrap();
        }

        let removed = store
            .delete_where("widget", &Filter::all().with_attribute("name", "b"))
            .unwrap();

        assert_eq!(removed, 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_commit_without_begin_fails() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.commit(),
            Err(DraftError::Transaction { .. })
        ));
        assert!(matches!(
            store.rollback(),
            Err(DraftError::Transaction { .. })
        ));
    }
}
