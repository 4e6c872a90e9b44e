//! In-process store with PostgreSQL-like constraint semantics.
//!
//! Enforces primary keys, foreign keys, NOT NULL, column types, varchar
//! length and enum membership. `begin` snapshots the whole database and
//! `rollback` restores the snapshot, so created types and tables are undone
//! along with rows.

use crate::error::{MigrateError, Result};
use crate::source::{ConfigRecord, ConfigSource};
use crate::target::schema::{ColumnDef, ColumnType, TableDef};
use crate::target::{Row, SqlValue, TargetStore};
use crate::typemap::EnumTypeDef;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Clone)]
struct MemTable {
    def: TableDef,
    rows: Vec<Row>,
    keys: BTreeSet<Vec<String>>,
}

impl MemTable {
    fn contains(&self, column: &str, value: &SqlValue) -> bool {
        self.rows.iter().any(|r| r.get(column) == value)
    }
}

#[derive(Debug, Clone, Default)]
struct Database {
    enum_types: BTreeMap<String, Vec<String>>,
    tables: BTreeMap<String, MemTable>,
}

#[derive(Debug, Default)]
struct State {
    db: Database,
    snapshot: Option<Database>,
}

/// In-memory implementation of [`ConfigSource`] and [`TargetStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    configs: Mutex<Vec<ConfigRecord>>,
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with generic config records.
    pub fn with_configs(configs: Vec<ConfigRecord>) -> Self {
        Self {
            configs: Mutex::new(configs),
            state: Mutex::default(),
        }
    }

    /// Snapshot of a table's rows, or `None` if the table does not exist.
    pub fn rows(&self, table: &str) -> Option<Vec<Row>> {
        lock(&self.state)
            .db
            .tables
            .get(table)
            .map(|t| t.rows.clone())
    }

    /// Names of the tables that currently exist.
    pub fn table_names(&self) -> Vec<String> {
        lock(&self.state).db.tables.keys().cloned().collect()
    }

    /// Names of the enum types that currently exist.
    pub fn enum_type_names(&self) -> Vec<String> {
        lock(&self.state).db.enum_types.keys().cloned().collect()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn undefined_table(table: &str) -> MigrateError {
    MigrateError::constraint(table, format!("relation \"{}\" does not exist", table))
}

/// Check one value against its column definition.
fn check_value(
    db: &Database,
    table: &str,
    col: &ColumnDef,
    value: &SqlValue,
) -> Result<()> {
    if value.is_null() {
        if col.nullable {
            return Ok(());
        }
        return Err(MigrateError::constraint(
            table,
            format!("null value in column \"{}\" violates not-null constraint", col.name),
        ));
    }

    match (col.column_type, value) {
        (ColumnType::Uuid, SqlValue::Uuid(_))
        | (ColumnType::Boolean, SqlValue::Bool(_))
        | (ColumnType::Jsonb, SqlValue::Json(_))
        | (ColumnType::TimestampTz, SqlValue::Timestamp(_)) => Ok(()),
        (ColumnType::Varchar(max), SqlValue::Text(s)) => {
            if s.chars().count() > max as usize {
                Err(MigrateError::constraint(
                    table,
                    format!(
                        "value too long for type character varying({}) in column \"{}\"",
                        max, col.name
                    ),
                ))
            } else {
                Ok(())
            }
        }
        (ColumnType::Enum(type_name), SqlValue::Enum(literal)) => {
            let literals = db.enum_types.get(type_name).ok_or_else(|| {
                MigrateError::constraint(table, format!("type \"{}\" does not exist", type_name))
            })?;
            if literals.iter().any(|l| l == literal) {
                Ok(())
            } else {
                Err(MigrateError::constraint(
                    table,
                    format!("invalid input value for enum {}: \"{}\"", type_name, literal),
                ))
            }
        }
        (expected, found) => Err(MigrateError::constraint(
            table,
            format!("column \"{}\" expects {:?}, got {:?}", col.name, expected, found),
        )),
    }
}

#[async_trait]
impl ConfigSource for MemoryStore {
    async fn list_configs(&self, config_type: &str) -> Result<Vec<ConfigRecord>> {
        Ok(lock(&self.configs)
            .iter()
            .filter(|r| r.config_type == config_type)
            .cloned()
            .collect())
    }

    fn source_type(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn begin(&self) -> Result<()> {
        let mut state = lock(&self.state);
        state.snapshot = Some(state.db.clone());
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        lock(&self.state).snapshot = None;
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let mut state = lock(&self.state);
        if let Some(snapshot) = state.snapshot.take() {
            state.db = snapshot;
        }
        Ok(())
    }

    async fn create_enum_type(&self, def: &EnumTypeDef) -> Result<()> {
        let mut state = lock(&self.state);
        if state.db.enum_types.contains_key(def.name) {
            debug!("Enum type {} already exists", def.name);
            return Ok(());
        }
        state.db.enum_types.insert(
            def.name.to_string(),
            def.literals.iter().map(|l| l.to_string()).collect(),
        );
        Ok(())
    }

    async fn create_table(&self, table: &TableDef) -> Result<()> {
        let mut state = lock(&self.state);
        if state.db.tables.contains_key(table.name) {
            debug!("Table {} already exists", table.name);
            return Ok(());
        }

        for col in &table.columns {
            if let ColumnType::Enum(type_name) = col.column_type {
                if !state.db.enum_types.contains_key(type_name) {
                    return Err(MigrateError::constraint(
                        table.name,
                        format!("type \"{}\" does not exist", type_name),
                    ));
                }
            }
        }

        for fk in &table.foreign_keys {
            if fk.ref_table != table.name && !state.db.tables.contains_key(fk.ref_table) {
                return Err(MigrateError::referential(
                    table.name,
                    format!("referenced relation \"{}\" does not exist", fk.ref_table),
                ));
            }
        }

        state.db.tables.insert(
            table.name.to_string(),
            MemTable {
                def: table.clone(),
                rows: Vec::new(),
                keys: BTreeSet::new(),
            },
        );
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(lock(&self.state).db.tables.contains_key(table))
    }

    async fn insert_row(&self, table: &TableDef, row: &Row) -> Result<()> {
        let mut state = lock(&self.state);
        let db = &mut state.db;

        let stored_def = db
            .tables
            .get(table.name)
            .map(|t| t.def.clone())
            .ok_or_else(|| undefined_table(table.name))?;

        if let Some(extra) = row.columns().find(|c| stored_def.column(c).is_none()) {
            return Err(MigrateError::constraint(
                table.name,
                format!("column \"{}\" does not exist", extra),
            ));
        }

        let mut stored = Row::new();
        for col in &stored_def.columns {
            let value = row.get(col.name);
            check_value(db, table.name, col, value)?;
            stored.set(col.name, value.clone());
        }

        for fk in &stored_def.foreign_keys {
            let value = stored.get(fk.column);
            if value.is_null() {
                continue;
            }
            let present = db
                .tables
                .get(fk.ref_table)
                .map(|t| t.contains(fk.ref_column, value))
                .unwrap_or(false);
            if !present {
                return Err(MigrateError::referential(
                    table.name,
                    format!(
                        "Key ({})=({}) is not present in table \"{}\"",
                        fk.column,
                        value.display(),
                        fk.ref_table
                    ),
                ));
            }
        }

        let key: Vec<String> = stored_def
            .key_of(&stored)
            .iter()
            .map(SqlValue::display)
            .collect();

        let mem_table = db
            .tables
            .get_mut(table.name)
            .ok_or_else(|| undefined_table(table.name))?;
        if mem_table.keys.contains(&key) {
            return Err(MigrateError::DuplicateKey {
                table: table.name.to_string(),
                key: stored_def.describe_key(&stored),
            });
        }
        mem_table.keys.insert(key);
        mem_table.rows.push(stored);
        Ok(())
    }

    async fn fetch_rows(&self, table: &TableDef) -> Result<Vec<Row>> {
        self.rows(table.name).ok_or_else(|| undefined_table(table.name))
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        lock(&self.state)
            .db
            .tables
            .get(table)
            .map(|t| t.rows.len() as i64)
            .ok_or_else(|| undefined_table(table))
    }

    fn db_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::schema;
    use crate::typemap::{enum_types, ActorType, PgEnum, SourceType};
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    async fn store_with_tables() -> MemoryStore {
        let store = MemoryStore::new();
        for def in enum_types() {
            store.create_enum_type(&def).await.unwrap();
        }
        for table in schema::all_tables() {
            store.create_table(&table).await.unwrap();
        }
        store
    }

    fn workspace_row(id: Uuid) -> Row {
        let now = Utc::now();
        Row::new()
            .with("id", id)
            .with("name", "default")
            .with("slug", "default")
            .with("initial_setup_complete", true)
            .with("created_at", now)
            .with("updated_at", now)
    }

    fn definition_row(id: Uuid, source_type: SqlValue) -> Row {
        let now = Utc::now();
        Row::new()
            .with("id", id)
            .with("name", "Postgres")
            .with("docker_repository", "airbyte/source-postgres")
            .with("docker_image_tag", "0.3.11")
            .with("documentation_url", "https://docs.airbyte.io")
            .with("actor_type", SqlValue::from_enum(ActorType::Source))
            .with("source_type", source_type)
            .with("spec", json!({}))
            .with("created_at", now)
            .with("updated_at", now)
    }

    #[tokio::test]
    async fn test_insert_and_duplicate_key() {
        let store = store_with_tables().await;
        let table = schema::workspace();
        let id = Uuid::new_v4();

        store.insert_row(&table, &workspace_row(id)).await.unwrap();
        assert_eq!(store.row_count("workspace").await.unwrap(), 1);

        let err = store.insert_row(&table, &workspace_row(id)).await.unwrap_err();
        assert!(matches!(err, MigrateError::DuplicateKey { .. }));
    }

    #[tokio::test]
    async fn test_not_null_violation() {
        let store = store_with_tables().await;
        let row = workspace_row(Uuid::new_v4()).with("slug", SqlValue::Null);
        let err = store.insert_row(&schema::workspace(), &row).await.unwrap_err();
        assert!(matches!(err, MigrateError::Constraint { .. }));
    }

    #[tokio::test]
    async fn test_enum_membership() {
        let store = store_with_tables().await;
        let table = schema::actor_definition();

        let ok = definition_row(Uuid::new_v4(), SqlValue::from_enum(SourceType::Api));
        store.insert_row(&table, &ok).await.unwrap();

        let bad = definition_row(Uuid::new_v4(), SqlValue::Enum("graphql".into()));
        let err = store.insert_row(&table, &bad).await.unwrap_err();
        match err {
            MigrateError::Constraint { message, .. } => {
                assert!(message.contains(SourceType::TYPE_NAME));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_foreign_key_violation() {
        let store = store_with_tables().await;
        let now = Utc::now();
        let row = Row::new()
            .with("id", Uuid::new_v4())
            .with("workspace_id", Uuid::new_v4())
            .with("name", "op")
            .with("operator_type", SqlValue::Enum("dbt".into()))
            .with("created_at", now)
            .with("updated_at", now);

        let err = store.insert_row(&schema::operation(), &row).await.unwrap_err();
        assert!(matches!(err, MigrateError::ReferentialIntegrity { .. }));
    }

    #[tokio::test]
    async fn test_varchar_length() {
        let store = store_with_tables().await;
        let row = workspace_row(Uuid::new_v4()).with("name", "x".repeat(257));
        let err = store.insert_row(&schema::workspace(), &row).await.unwrap_err();
        assert!(matches!(err, MigrateError::Constraint { .. }));
    }

    #[tokio::test]
    async fn test_create_table_before_reference_fails() {
        let store = MemoryStore::new();
        for def in enum_types() {
            store.create_enum_type(&def).await.unwrap();
        }
        let err = store.create_table(&schema::actor()).await.unwrap_err();
        assert!(matches!(err, MigrateError::ReferentialIntegrity { .. }));
    }

    #[tokio::test]
    async fn test_rollback_restores_snapshot() {
        let store = MemoryStore::new();
        store.begin().await.unwrap();
        for def in enum_types() {
            store.create_enum_type(&def).await.unwrap();
        }
        store.create_table(&schema::workspace()).await.unwrap();
        store
            .insert_row(&schema::workspace(), &workspace_row(Uuid::new_v4()))
            .await
            .unwrap();
        store.rollback().await.unwrap();

        assert!(store.table_names().is_empty());
        assert!(store.enum_type_names().is_empty());
        assert!(!store.table_exists("workspace").await.unwrap());
    }

    #[tokio::test]
    async fn test_commit_keeps_changes() {
        let store = MemoryStore::new();
        store.begin().await.unwrap();
        store.create_table(&schema::workspace()).await.unwrap();
        store.commit().await.unwrap();
        store.rollback().await.unwrap();
        assert!(store.table_exists("workspace").await.unwrap());
    }
}
