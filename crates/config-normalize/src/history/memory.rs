//! In-memory migration history for dry runs and tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

use super::{AppliedMigration, HistoryBackend};
use crate::error::Result;

/// History that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryHistoryBackend {
    entries: Mutex<BTreeMap<String, AppliedMigration>>,
}

impl MemoryHistoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded entry, ordered by version.
    pub fn entries(&self) -> Vec<AppliedMigration> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl HistoryBackend for MemoryHistoryBackend {
    async fn init_schema(&self) -> Result<()> {
        warn!("Using in-memory migration history: the applied version will not be persisted.");
        Ok(())
    }

    async fn applied(&self, version: &str) -> Result<Option<AppliedMigration>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(version)
            .cloned())
    }

    async fn record(&self, entry: &AppliedMigration) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry.version.clone(), entry.clone());
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MIGRATION_VERSION;

    #[tokio::test]
    async fn test_record_replaces_same_version() {
        let history = MemoryHistoryBackend::new();
        assert!(history.applied(MIGRATION_VERSION).await.unwrap().is_none());

        history
            .record(&AppliedMigration::current("public", "a", 1))
            .await
            .unwrap();
        history
            .record(&AppliedMigration::current("public", "b", 2))
            .await
            .unwrap();

        let entries = history.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].rows_written, 2);
    }
}
