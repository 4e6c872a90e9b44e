//! Migration orchestrator - main workflow coordinator.
//!
//! A run is one unit of work on the target: enum types and tables are
//! created upfront in dependency order, then populated entity by entity,
//! optionally verified, recorded in the migration history, and committed.
//! Any error rolls everything back.

mod progress;

pub use progress::{Phase, ProgressReporter, TracingReporter};

use crate::config::Config;
use crate::error::{MigrateError, Result};
use crate::history::{
    AppliedMigration, DbHistoryBackend, HistoryBackend, MemoryHistoryBackend, MIGRATION_VERSION,
};
use crate::normalize::{Entity, Normalizer, TableOutcome};
use crate::source::ConfigSource;
use crate::target::schema::{self, TableDef};
use crate::target::{MemoryStore, PgStore, TargetStore};
use crate::typemap::enum_types;
use crate::verify::{Verifier, VerifyReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Entities in population order. Every entity only references entities
/// that come before it.
pub const POPULATION_ORDER: [Entity; 7] = [
    Entity::Workspace,
    Entity::ActorDefinition,
    Entity::Actor,
    Entity::ActorOauthParameter,
    Entity::Operation,
    Entity::Connection,
    Entity::State,
];

/// Check that every foreign key references a table earlier in `tables`.
pub fn validate_table_order(tables: &[TableDef]) -> Result<()> {
    for (i, table) in tables.iter().enumerate() {
        for referenced in table.references() {
            if referenced == table.name {
                continue;
            }
            if !tables[..i].iter().any(|t| t.name == referenced) {
                return Err(MigrateError::InvalidOrder(format!(
                    "{} references {}, which does not precede it",
                    table.name, referenced
                )));
            }
        }
    }
    Ok(())
}

/// Tables written by `order`, in the order they are written.
pub fn population_tables(order: &[Entity]) -> Vec<TableDef> {
    order.iter().flat_map(|e| e.tables()).collect()
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Applied migration version.
    pub version: String,

    /// Final status.
    pub status: String,

    /// Target store the run wrote to.
    pub target_type: String,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Per-table outcome, in population order.
    pub tables: Vec<TableOutcome>,

    /// Total rows written across all tables.
    pub rows_written: u64,

    /// Present when verification ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerifyReport>,
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Migration orchestrator.
pub struct Orchestrator {
    source: Arc<dyn ConfigSource>,
    target: Arc<dyn TargetStore>,
    history: Option<Arc<dyn HistoryBackend>>,
    reporter: Arc<dyn ProgressReporter>,
    target_schema: String,
    config_hash: String,
    verify_after_run: bool,
    force: bool,
}

impl Orchestrator {
    /// Create an orchestrator over explicit stores. No history is kept and
    /// verification is off until enabled.
    pub fn new(source: Arc<dyn ConfigSource>, target: Arc<dyn TargetStore>) -> Self {
        Self {
            source,
            target,
            history: None,
            reporter: Arc::new(TracingReporter),
            target_schema: "public".to_string(),
            config_hash: String::new(),
            verify_after_run: false,
            force: false,
        }
    }

    /// Connect to the configured PostgreSQL database, which is both the
    /// source and the target, with history kept next to it on the same
    /// connection.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = Arc::new(PgStore::connect(&config.target, &config.migration).await?);
        let history = DbHistoryBackend::new(
            store.clone(),
            config.migration.history_schema.clone(),
        );

        Ok(Self::new(store.clone(), store)
            .with_history(Arc::new(history))
            .with_target_schema(&config.target.schema)
            .with_config_hash(config.hash())
            .with_verification(config.migration.verify_after_run))
    }

    /// Read from the configured database but write into memory. Nothing in
    /// the database is changed.
    pub async fn dry_run_from_config(config: &Config) -> Result<Self> {
        let source = Arc::new(PgStore::connect(&config.target, &config.migration).await?);
        info!("Dry run: writing into an in-memory store");

        Ok(Self::new(source, Arc::new(MemoryStore::new()))
            .with_history(Arc::new(MemoryHistoryBackend::new()))
            .with_target_schema(&config.target.schema)
            .with_config_hash(config.hash())
            .with_verification(config.migration.verify_after_run))
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryBackend>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify_after_run = verify;
        self
    }

    /// Run even if the version is already recorded as applied.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_target_schema(mut self, schema: &str) -> Self {
        self.target_schema = schema.to_string();
        self
    }

    pub fn with_config_hash(mut self, hash: String) -> Self {
        self.config_hash = hash;
        self
    }

    /// Create every enum type and table, in dependency order. Idempotent.
    pub async fn create_schema(&self) -> Result<()> {
        let tables = schema::all_tables();
        validate_table_order(&tables)?;

        for def in enum_types() {
            debug!("Creating enum type {}", def.name);
            self.target.create_enum_type(&def).await?;
        }
        for table in &tables {
            debug!("Creating table {}", table.name);
            self.target.create_table(table).await?;
        }

        info!(
            "Schema ready: {} enum types, {} tables",
            enum_types().len(),
            tables.len()
        );
        Ok(())
    }

    /// Populate every table in [`POPULATION_ORDER`].
    pub async fn populate(&self) -> Result<Vec<TableOutcome>> {
        self.populate_in(&POPULATION_ORDER).await
    }

    /// Populate in a caller-chosen order. The order is checked before any
    /// row is written.
    pub async fn populate_in(&self, order: &[Entity]) -> Result<Vec<TableOutcome>> {
        let tables = population_tables(order);
        validate_table_order(&tables)?;

        let normalizer = Normalizer::new(self.source.as_ref(), self.target.as_ref());
        let total = tables.len();
        let mut outcomes = Vec::with_capacity(total);

        for entity in order {
            for outcome in normalizer.populate(*entity).await? {
                self.reporter.table_done(&outcome, outcomes.len() + 1, total);
                outcomes.push(outcome);
            }
        }

        Ok(outcomes)
    }

    /// Compare the target tables with the generic config table.
    pub async fn verify(&self) -> Result<VerifyReport> {
        Verifier::new(self.source.as_ref(), self.target.as_ref())
            .verify()
            .await
    }

    /// Run the migration as one unit of work.
    pub async fn run(self) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        info!(
            "Starting migration {} (run {}) from {} into {}",
            MIGRATION_VERSION,
            run_id,
            self.source.source_type(),
            self.target.db_type()
        );

        validate_table_order(&population_tables(&POPULATION_ORDER))?;
        self.check_history().await?;

        self.target.begin().await?;
        let (tables, verification) = match self.apply().await {
            Ok(applied) => applied,
            Err(e) => {
                error!("Migration failed, rolling back: {}", e);
                if let Err(rollback_err) = self.target.rollback().await {
                    error!("Rollback failed: {}", rollback_err);
                }
                return Err(e);
            }
        };

        self.reporter.phase(Phase::Committing);
        self.target.commit().await?;

        let rows_written: u64 = tables.iter().map(|t| t.rows_written).sum();

        let completed_at = Utc::now();
        let duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        info!(
            "Migration {} completed: {} rows in {} tables ({:.2}s)",
            MIGRATION_VERSION,
            rows_written,
            tables.len(),
            duration_seconds
        );

        Ok(MigrationResult {
            run_id,
            version: MIGRATION_VERSION.to_string(),
            status: "completed".to_string(),
            target_type: self.target.db_type().to_string(),
            started_at,
            completed_at,
            duration_seconds,
            tables,
            rows_written,
            verification,
        })
    }

    async fn check_history(&self) -> Result<()> {
        let Some(history) = &self.history else {
            return Ok(());
        };

        debug!("Checking {} migration history", history.backend_type());
        history.init_schema().await?;
        if let Some(entry) = history.applied(MIGRATION_VERSION).await? {
            if !self.force {
                return Err(MigrateError::AlreadyApplied {
                    version: entry.version,
                });
            }
            warn!(
                "Migration {} was applied at {}; running again because of --force",
                entry.version, entry.applied_at
            );
        }
        Ok(())
    }

    /// Everything between `begin` and `commit`, history entry included.
    async fn apply(&self) -> Result<(Vec<TableOutcome>, Option<VerifyReport>)> {
        self.reporter.phase(Phase::CreatingSchema);
        self.create_schema().await?;

        self.reporter.phase(Phase::Populating);
        let tables = self.populate().await?;

        let verification = if self.verify_after_run {
            self.reporter.phase(Phase::Verifying);
            let report = self.verify().await?;
            if !report.is_consistent() {
                return Err(MigrateError::Verification(report.summary()));
            }
            Some(report)
        } else {
            None
        };

        if let Some(history) = &self.history {
            let rows_written: u64 = tables.iter().map(|t| t.rows_written).sum();
            let entry =
                AppliedMigration::current(&self.target_schema, &self.config_hash, rows_written as i64);
            history.record(&entry).await?;
        }

        Ok((tables, verification))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order_is_valid() {
        validate_table_order(&schema::all_tables()).unwrap();
        validate_table_order(&population_tables(&POPULATION_ORDER)).unwrap();
    }

    #[test]
    fn test_population_tables_cover_schema() {
        let populated: Vec<&str> = population_tables(&POPULATION_ORDER)
            .iter()
            .map(|t| t.name)
            .collect();
        let created: Vec<&str> = schema::all_tables().iter().map(|t| t.name).collect();
        assert_eq!(populated, created);
    }

    #[test]
    fn test_reordering_fails() {
        let order = [
            Entity::Workspace,
            Entity::Actor,
            Entity::ActorDefinition,
        ];
        match validate_table_order(&population_tables(&order)) {
            Err(MigrateError::InvalidOrder(msg)) => {
                assert!(msg.contains("actor references actor_definition"));
            }
            other => panic!("expected InvalidOrder, got {:?}", other),
        }
    }

    #[test]
    fn test_state_before_connection_fails() {
        let order = [Entity::State, Entity::Connection];
        assert!(validate_table_order(&population_tables(&order)).is_err());
    }
}
