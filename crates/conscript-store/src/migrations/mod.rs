//! Schema migrations
//!
//! SQL lives in `migrations/*.sql` at the crate root and is embedded at
//! build time. `apply_migrations` is idempotent and verifies checksums of
//! everything already applied.

mod checksums;
mod embedded;
mod runner;

pub use checksums::compute_checksum;
pub use embedded::{get_migrations, Migration};
pub use runner::{applied_migrations, apply_migrations};
