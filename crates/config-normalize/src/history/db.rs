//! PostgreSQL-backed migration history.
//!
//! Stores applied migrations in `<history_schema>.schema_history`, next to
//! but outside of the normalized tables.
//!
//! Statements go through the store's own connection, so an entry recorded
//! between `BEGIN` and `COMMIT` is part of the run's transaction.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{AppliedMigration, HistoryBackend};
use crate::error::Result;
use crate::target::schema::{qualify, quote_ident};
use crate::target::PgStore;

/// Database history backend.
pub struct DbHistoryBackend {
    store: Arc<PgStore>,
    schema: String,
}

impl DbHistoryBackend {
    pub fn new(store: Arc<PgStore>, schema: impl Into<String>) -> Self {
        Self {
            store,
            schema: schema.into(),
        }
    }

    fn table(&self) -> String {
        qualify(&self.schema, "schema_history")
    }
}

#[async_trait]
impl HistoryBackend for DbHistoryBackend {
    async fn init_schema(&self) -> Result<()> {
        let ddl = format!(
            "CREATE SCHEMA IF NOT EXISTS {};
             CREATE TABLE IF NOT EXISTS {} (
                version TEXT PRIMARY KEY,
                description TEXT NOT NULL,
                checksum TEXT NOT NULL,
                config_hash TEXT NOT NULL,
                rows_written BIGINT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL
             )",
            quote_ident(&self.schema),
            self.table()
        );
        self.store.client().batch_execute(&ddl).await?;

        debug!("Migration history ready in schema {}", self.schema);
        Ok(())
    }

    async fn applied(&self, version: &str) -> Result<Option<AppliedMigration>> {
        let query = format!(
            "SELECT version, description, checksum, config_hash, rows_written, applied_at
             FROM {} WHERE version = $1",
            self.table()
        );
        let row = self
            .store
            .client()
            .query_opt(query.as_str(), &[&version])
            .await?;

        Ok(row.map(|r| AppliedMigration {
            version: r.get(0),
            description: r.get(1),
            checksum: r.get(2),
            config_hash: r.get(3),
            rows_written: r.get(4),
            applied_at: r.get(5),
        }))
    }

    async fn record(&self, entry: &AppliedMigration) -> Result<()> {
        let query = format!(
            "INSERT INTO {} (version, description, checksum, config_hash, rows_written, applied_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (version) DO UPDATE SET
                description = EXCLUDED.description,
                checksum = EXCLUDED.checksum,
                config_hash = EXCLUDED.config_hash,
                rows_written = EXCLUDED.rows_written,
                applied_at = EXCLUDED.applied_at",
            self.table()
        );

        self.store
            .client()
            .execute(
                query.as_str(),
                &[
                    &entry.version,
                    &entry.description,
                    &entry.checksum,
                    &entry.config_hash,
                    &entry.rows_written,
                    &entry.applied_at,
                ],
            )
            .await?;

        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }
}
