//! SQL migrations compiled into the binary

use super::checksums::compute_checksum;

/// One embedded migration; `id` doubles as its row key in `schema_version`
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

impl Migration {
    /// Hex SHA-256 of the SQL text
    pub fn checksum(&self) -> String {
        compute_checksum(self.sql)
    }
}

const MIGRATIONS: &[Migration] = &[Migration {
    id: "001_records",
    sql: include_str!("../../migrations/001_records.sql"),
}];

/// Every embedded migration, oldest first
pub fn get_migrations() -> &'static [Migration] {
    MIGRATIONS
}
