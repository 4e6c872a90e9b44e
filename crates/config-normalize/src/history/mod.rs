//! Applied-migration history.
//!
//! The normalization runs exactly once per target database. A successful run
//! records its version, a checksum of the DDL it applied and the number of
//! rows written; a later run of the same version is refused unless forced.

mod backend;
mod db;
mod memory;

pub use backend::HistoryBackend;
pub use db::DbHistoryBackend;
pub use memory::MemoryHistoryBackend;

use crate::target::schema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Version of the normalization, in the runner's version order.
pub const MIGRATION_VERSION: &str = "0.32.8.001";

pub const MIGRATION_DESCRIPTION: &str = "Migrate generic config records to normalized tables";

/// One row of the history table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedMigration {
    pub version: String,
    pub description: String,

    /// SHA256 of the DDL script for the target schema.
    pub checksum: String,

    /// SHA256 of the configuration used for the run.
    pub config_hash: String,

    pub rows_written: i64,
    pub applied_at: DateTime<Utc>,
}

impl AppliedMigration {
    /// History entry for the current version.
    pub fn current(target_schema: &str, config_hash: &str, rows_written: i64) -> Self {
        Self {
            version: MIGRATION_VERSION.to_string(),
            description: MIGRATION_DESCRIPTION.to_string(),
            checksum: checksum(target_schema),
            config_hash: config_hash.to_string(),
            rows_written,
            applied_at: Utc::now(),
        }
    }
}

/// SHA256 of the DDL script applied to `target_schema`.
pub fn checksum(target_schema: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(schema::migration_script(target_schema).as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_depends_on_schema() {
        assert_eq!(checksum("public"), checksum("public"));
        assert_ne!(checksum("public"), checksum("airbyte"));
        assert_eq!(checksum("public").len(), 64);
    }

    #[test]
    fn test_current_entry() {
        let entry = AppliedMigration::current("public", "abc", 12);
        assert_eq!(entry.version, MIGRATION_VERSION);
        assert_eq!(entry.rows_written, 12);
        assert_eq!(entry.checksum, checksum("public"));
    }
}
