//! Migration fingerprints
//!
//! The digest is recorded when a migration is applied. Editing an applied
//! migration's SQL changes the digest and `apply_migrations` refuses to run.

use sha2::{Digest, Sha256};

pub fn compute_checksum(sql: &str) -> String {
    hex::encode(Sha256::digest(sql.as_bytes()))
}
