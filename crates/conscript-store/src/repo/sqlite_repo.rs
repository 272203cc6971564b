//! SQLite record store
//!
//! All record types live in one `records` table. Attributes are stored as a
//! JSON object; association members are rows pointing at their owner.
//! Transactions map onto `BEGIN IMMEDIATE` at the outermost level and
//! savepoints below it, so a nested rollback only undoes its own scope.

use std::path::Path;

use chrono::{DateTime, Utc};
use conscript_core::errors::DraftError;
use conscript_core::model::{Filter, Record, RecordId};
use conscript_core::store::RecordStore;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db;
use crate::errors::{from_rusqlite, Result};
use crate::migrations::apply_migrations;

const RECORD_COLUMNS: &str =
    "id, record_type, is_draft, draft_parent_id, attributes, created_at, updated_at";

/// Row as read from `records`, before attributes are decoded
struct StoredRow {
    id: RecordId,
    record_type: String,
    is_draft: bool,
    draft_parent_id: Option<RecordId>,
    attributes: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoredRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            record_type: row.get(1)?,
            is_draft: row.get(2)?,
            draft_parent_id: row.get(3)?,
            attributes: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

/// Where an association member hangs
#[derive(Clone, Copy)]
struct Owner<'a> {
    id: RecordId,
    association: &'a str,
    position: usize,
}

/// `RecordStore` backed by a SQLite connection
pub struct SqliteRecordStore {
    conn: Connection,
    depth: usize,
}

impl std::fmt::Debug for SqliteRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRecordStore")
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl SqliteRecordStore {
    /// Wrap a connection, configuring it and applying pending migrations
    ///
    /// # Errors
    ///
    /// Fails if the connection cannot be configured or a migration fails.
    pub fn new(mut conn: Connection) -> Result<Self> {
        db::configure(&conn)?;
        apply_migrations(&mut conn)?;
        Ok(Self { conn, depth: 0 })
    }

    /// Open (or create) a database file
    ///
    /// # Errors
    ///
    /// See [`SqliteRecordStore::new`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(db::open(path)?)
    }

    /// Open a fresh in-memory database
    ///
    /// # Errors
    ///
    /// See [`SqliteRecordStore::new`].
    pub fn open_in_memory() -> Result<Self> {
        Self::new(db::open_in_memory()?)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Number of open transaction scopes
    pub fn transaction_depth(&self) -> usize {
        self.depth
    }

    /// Run `f` in its own scope so multi-statement writes land together
    fn atomically<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.begin()?;
        match f(self) {
            Ok(value) => match self.commit() {
                Ok(()) => Ok(value),
                Err(err) => {
                    if let Err(rollback_err) = self.rollback() {
                        tracing::warn!(error = %rollback_err, "rollback after failed commit also failed");
                    }
                    Err(err)
                }
            },
            Err(err) => {
                if let Err(rollback_err) = self.rollback() {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    fn write_record(&mut self, record: &mut Record, owner: Option<Owner<'_>>) -> Result<()> {
        let now = Utc::now();
        let attributes = serde_json::to_string(&record.attributes)?;
        let owner_id = owner.map(|o| o.id);
        let association = owner.map(|o| o.association);
        let position = owner.map_or(0, |o| o.position as i64);

        match record.id {
            Some(id) => {
                let created_at: DateTime<Utc> = self
                    .conn
                    .query_row(
                        "SELECT created_at FROM records WHERE id = ?1 AND record_type = ?2",
                        params![id, record.record_type],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(from_rusqlite)?
                    .ok_or_else(|| DraftError::RecordNotFound {
                        record_type: record.record_type.clone(),
                        record_id: id,
                    })?;

                self.conn
                    .execute(
                        "UPDATE records SET
                            is_draft = ?2,
                            draft_parent_id = ?3,
                            owner_id = ?4,
                            association = ?5,
                            position = ?6,
                            attributes = ?7,
                            updated_at = ?8
                         WHERE id = ?1",
                        params![
                            id,
                            record.is_draft,
                            record.draft_parent_id,
                            owner_id,
                            association,
                            position,
                            attributes,
                            now,
                        ],
                    )
                    .map_err(from_rusqlite)?;
                record.created_at = Some(created_at);
            }
            None => {
                self.conn
                    .execute(
                        "INSERT INTO records (record_type, is_draft, draft_parent_id, owner_id, association, position, attributes, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                        params![
                            record.record_type,
                            record.is_draft,
                            record.draft_parent_id,
                            owner_id,
                            association,
                            position,
                            attributes,
                            now,
                        ],
                    )
                    .map_err(from_rusqlite)?;
                record.id = Some(self.conn.last_insert_rowid());
                record.created_at = Some(now);
            }
        }
        record.updated_at = Some(now);

        let id = record.id.ok_or_else(|| DraftError::Internal {
            message: "record id missing after write".to_string(),
        })?;
        for (name, children) in record.associations.iter_mut() {
            let keep: Vec<RecordId> = children.iter().filter_map(|c| c.id).collect();
            self.prune_association(id, name, &keep)?;
            for (position, child) in children.iter_mut().enumerate() {
                let owner = Owner {
                    id,
                    association: name,
                    position,
                };
                self.write_record(child, Some(owner))?;
            }
        }
        Ok(())
    }

    /// Delete members of an association that are not in `keep`
    fn prune_association(&self, owner_id: RecordId, association: &str, keep: &[RecordId]) -> Result<()> {
        let existing = {
            let mut stmt = self
                .conn
                .prepare_cached("SELECT id FROM records WHERE owner_id = ?1 AND association = ?2")
                .map_err(from_rusqlite)?;
            let ids = stmt
                .query_map(params![owner_id, association], |row| row.get::<_, RecordId>(0))
                .map_err(from_rusqlite)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(from_rusqlite)?;
            ids
        };
        for id in existing.into_iter().filter(|id| !keep.contains(id)) {
            self.conn
                .execute("DELETE FROM records WHERE id = ?1", [id])
                .map_err(from_rusqlite)?;
        }
        Ok(())
    }

    /// Top-level rows of a type matching the filter's structural criteria
    fn top_level_rows(&self, record_type: &str, filter: &Filter) -> Result<Vec<StoredRow>> {
        let sql = format!(
            "SELECT {} FROM records
             WHERE record_type = ?1 AND owner_id IS NULL
               AND (?2 IS NULL OR is_draft = ?2)
               AND (?3 IS NULL OR draft_parent_id = ?3)
             ORDER BY id",
            RECORD_COLUMNS
        );
        let mut stmt = self.conn.prepare_cached(&sql).map_err(from_rusqlite)?;
        let rows = stmt
            .query_map(
                params![record_type, filter.is_draft, filter.draft_parent_id],
                StoredRow::read,
            )
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        Ok(rows)
    }

    fn child_rows(&self, owner_id: RecordId) -> Result<Vec<(String, StoredRow)>> {
        let sql = format!(
            "SELECT {}, association FROM records WHERE owner_id = ?1 ORDER BY association, position, id",
            RECORD_COLUMNS
        );
        let mut stmt = self.conn.prepare_cached(&sql).map_err(from_rusqlite)?;
        let rows = stmt
            .query_map([owner_id], |row| Ok((row.get(7)?, StoredRow::read(row)?)))
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        Ok(rows)
    }

    /// Decode a row and load its associations
    fn hydrate(&self, row: StoredRow) -> Result<Record> {
        let mut record = Record::new(row.record_type);
        record.id = Some(row.id);
        record.is_draft = row.is_draft;
        record.draft_parent_id = row.draft_parent_id;
        record.attributes = serde_json::from_str(&row.attributes)?;
        record.created_at = Some(row.created_at);
        record.updated_at = Some(row.updated_at);

        for (association, child) in self.child_rows(row.id)? {
            let child = self.hydrate(child)?;
            record.association_mut(&association).push(child);
        }
        Ok(record)
    }
}

fn savepoint_name(level: usize) -> String {
    format!("conscript_sp_{}", level)
}

impl RecordStore for SqliteRecordStore {
    fn find(&self, record_type: &str, id: RecordId) -> Result<Option<Record>> {
        let sql = format!(
            "SELECT {} FROM records WHERE id = ?1 AND record_type = ?2 AND owner_id IS NULL",
            RECORD_COLUMNS
        );
        let row = self
            .conn
            .query_row(&sql, params![id, record_type], StoredRow::read)
            .optional()
            .map_err(from_rusqlite)?;
        row.map(|row| self.hydrate(row)).transpose()
    }

    fn persist(&mut self, record: &mut Record) -> Result<()> {
        self.atomically(|store| store.write_record(record, None))?;
        tracing::debug!(
            record_type = %record.record_type,
            record_id = ?record.id,
            "persisted record"
        );
        Ok(())
    }

    fn delete(&mut self, record: &Record) -> Result<()> {
        let id = record.id.ok_or_else(|| DraftError::NotPersisted {
            record_type: record.record_type.clone(),
        })?;
        let removed = self
            .conn
            .execute(
                "DELETE FROM records WHERE id = ?1 AND record_type = ?2 AND owner_id IS NULL",
                params![id, record.record_type],
            )
            .map_err(from_rusqlite)?;
        if removed == 0 {
            return Err(DraftError::RecordNotFound {
                record_type: record.record_type.clone(),
                record_id: id,
            });
        }
        Ok(())
    }

    fn delete_where(&mut self, record_type: &str, filter: &Filter) -> Result<usize> {
        let ids: Vec<RecordId> = self
            .query_where(record_type, filter)?
            .into_iter()
            .filter_map(|r| r.id)
            .collect();
        self.atomically(|store| {
            let mut removed = 0;
            for id in ids {
                // Cascades from an earlier delete may already have taken this row
                removed += store
                    .conn
                    .execute("DELETE FROM records WHERE id = ?1", [id])
                    .map_err(from_rusqlite)?;
            }
            Ok(removed)
        })
    }

    fn query_where(&self, record_type: &str, filter: &Filter) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        for row in self.top_level_rows(record_type, filter)? {
            let record = self.hydrate(row)?;
            if filter.matches(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn count_where(&self, record_type: &str, filter: &Filter) -> Result<usize> {
        if !filter.is_structural() {
            return Ok(self.query_where(record_type, filter)?.len());
        }
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM records
                 WHERE record_type = ?1 AND owner_id IS NULL
                   AND (?2 IS NULL OR is_draft = ?2)
                   AND (?3 IS NULL OR draft_parent_id = ?3)",
                params![record_type, filter.is_draft, filter.draft_parent_id],
                |row| row.get(0),
            )
            .map_err(from_rusqlite)?;
        Ok(count as usize)
    }

    fn begin(&mut self) -> Result<()> {
        let sql = if self.depth == 0 {
            "BEGIN IMMEDIATE".to_string()
        } else {
            format!("SAVEPOINT {}", savepoint_name(self.depth))
        };
        self.conn.execute_batch(&sql).map_err(from_rusqlite)?;
        self.depth += 1;
        tracing::trace!(depth = self.depth, "transaction scope opened");
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let level = self.depth.checked_sub(1).ok_or_else(|| DraftError::Transaction {
            message: "commit without an open transaction".to_string(),
        })?;
        let sql = if level == 0 {
            "COMMIT".to_string()
        } else {
            format!("RELEASE SAVEPOINT {}", savepoint_name(level))
        };
        self.conn.execute_batch(&sql).map_err(from_rusqlite)?;
        self.depth = level;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        let level = self.depth.checked_sub(1).ok_or_else(|| DraftError::Transaction {
            message: "rollback without an open transaction".to_string(),
        })?;
        self.depth = level;
        let sql = if level == 0 {
            "ROLLBACK".to_string()
        } else {
            let name = savepoint_name(level);
            format!("ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name}")
        };
        self.conn.execute_batch(&sql).map_err(from_rusqlite)?;
        tracing::trace!(depth = self.depth, "transaction scope rolled back");
        Ok(())
    }
}
