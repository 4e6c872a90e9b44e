//! Target relational store operations.
//!
//! [`TargetStore`] is the seam between the normalizer and the database. The
//! PostgreSQL implementation lives in [`postgres`]; [`memory`] provides an
//! in-process store with the same constraint semantics for dry runs and tests.

pub mod memory;
pub mod postgres;
pub mod schema;

pub use memory::MemoryStore;
pub use postgres::{HealthCheckResult, PgStore};
pub use schema::{ColumnDef, ColumnType, ForeignKeyDef, IndexDef, TableDef};

use crate::error::{MigrateError, Result};
use crate::typemap::{EnumTypeDef, PgEnum};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Trait for target database operations.
///
/// All statements issued between [`begin`](TargetStore::begin) and
/// [`commit`](TargetStore::commit) form one unit of work.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Open the unit of work.
    async fn begin(&self) -> Result<()>;

    /// Make everything since `begin` durable.
    async fn commit(&self) -> Result<()>;

    /// Discard everything since `begin`, including created types and tables.
    async fn rollback(&self) -> Result<()>;

    /// Create a named enum type. Creating an existing type is a no-op.
    async fn create_enum_type(&self, def: &EnumTypeDef) -> Result<()>;

    /// Create a table with its keys and indexes. Creating an existing table
    /// is a no-op.
    async fn create_table(&self, table: &TableDef) -> Result<()>;

    /// Check if a table exists.
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Insert one row. Fails on primary key, foreign key, NOT NULL and enum
    /// violations.
    async fn insert_row(&self, table: &TableDef, row: &Row) -> Result<()>;

    /// Read every row of a table.
    async fn fetch_rows(&self, table: &TableDef) -> Result<Vec<Row>>;

    /// Get the row count for a table.
    async fn row_count(&self, table: &str) -> Result<i64>;

    /// Get the database type.
    fn db_type(&self) -> &'static str;
}

/// SQL value enum for type-safe row handling.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Text(String),
    Uuid(Uuid),
    Json(serde_json::Value),
    Timestamp(DateTime<Utc>),
    /// Literal of a named enum type.
    Enum(String),
}

impl SqlValue {
    /// Wrap a relational enum value.
    pub fn from_enum<E: PgEnum>(value: E) -> Self {
        SqlValue::Enum(value.literal().to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Render for error messages and key comparison.
    pub fn display(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(b) => b.to_string(),
            SqlValue::Text(s) | SqlValue::Enum(s) => s.clone(),
            SqlValue::Uuid(u) => u.to_string(),
            SqlValue::Json(v) => v.to_string(),
            SqlValue::Timestamp(t) => t.to_rfc3339(),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(v: serde_json::Value) -> Self {
        SqlValue::Json(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

static NULL: SqlValue = SqlValue::Null;

/// One target row: column name to value. Absent columns read as NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: BTreeMap<String, SqlValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: &str, value: impl Into<SqlValue>) {
        self.values.insert(column.to_string(), value.into());
    }

    pub fn get(&self, column: &str) -> &SqlValue {
        self.values.get(column).unwrap_or(&NULL)
    }

    /// Column names carried by this row.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn uuid(&self, column: &str) -> Result<Uuid> {
        self.opt_uuid(column)?.ok_or_else(|| missing(column))
    }

    pub fn opt_uuid(&self, column: &str) -> Result<Option<Uuid>> {
        match self.get(column) {
            SqlValue::Null => Ok(None),
            SqlValue::Uuid(u) => Ok(Some(*u)),
            other => Err(mistyped(column, "uuid", other)),
        }
    }

    pub fn text(&self, column: &str) -> Result<String> {
        self.opt_text(column)?.ok_or_else(|| missing(column))
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>> {
        match self.get(column) {
            SqlValue::Null => Ok(None),
            SqlValue::Text(s) => Ok(Some(s.clone())),
            other => Err(mistyped(column, "text", other)),
        }
    }

    pub fn bool(&self, column: &str) -> Result<bool> {
        self.opt_bool(column)?.ok_or_else(|| missing(column))
    }

    pub fn opt_bool(&self, column: &str) -> Result<Option<bool>> {
        match self.get(column) {
            SqlValue::Null => Ok(None),
            SqlValue::Bool(b) => Ok(Some(*b)),
            other => Err(mistyped(column, "boolean", other)),
        }
    }

    pub fn json(&self, column: &str) -> Result<serde_json::Value> {
        self.opt_json(column)?.ok_or_else(|| missing(column))
    }

    pub fn opt_json(&self, column: &str) -> Result<Option<serde_json::Value>> {
        match self.get(column) {
            SqlValue::Null => Ok(None),
            SqlValue::Json(v) => Ok(Some(v.clone())),
            other => Err(mistyped(column, "jsonb", other)),
        }
    }

    pub fn timestamp(&self, column: &str) -> Result<DateTime<Utc>> {
        match self.get(column) {
            SqlValue::Timestamp(t) => Ok(*t),
            SqlValue::Null => Err(missing(column)),
            other => Err(mistyped(column, "timestamptz", other)),
        }
    }

    pub fn enum_value<E: PgEnum>(&self, column: &str) -> Result<E> {
        self.opt_enum_value(column)?.ok_or_else(|| missing(column))
    }

    pub fn opt_enum_value<E: PgEnum>(&self, column: &str) -> Result<Option<E>> {
        match self.get(column) {
            SqlValue::Null => Ok(None),
            SqlValue::Enum(s) | SqlValue::Text(s) => E::from_literal(s).map(Some),
            other => Err(mistyped(column, E::TYPE_NAME, other)),
        }
    }
}

fn missing(column: &str) -> MigrateError {
    MigrateError::Verification(format!("column {} is unexpectedly NULL", column))
}

fn mistyped(column: &str, expected: &str, found: &SqlValue) -> MigrateError {
    MigrateError::Verification(format!(
        "column {} expected {}, found {:?}",
        column, expected, found
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typemap::ActorType;

    #[test]
    fn test_absent_column_reads_null() {
        let row = Row::new().with("name", "pg");
        assert_eq!(row.get("icon"), &SqlValue::Null);
        assert_eq!(row.opt_text("icon").unwrap(), None);
        assert!(row.text("icon").is_err());
    }

    #[test]
    fn test_option_conversion() {
        let none: Option<bool> = None;
        assert_eq!(SqlValue::from(none), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(true)), SqlValue::Bool(true));
    }

    #[test]
    fn test_typed_getters_reject_wrong_type() {
        let row = Row::new().with("id", "not-a-uuid");
        assert!(row.uuid("id").is_err());
    }

    #[test]
    fn test_enum_getter() {
        let row = Row::new().with("actor_type", SqlValue::from_enum(ActorType::Destination));
        assert_eq!(
            row.enum_value::<ActorType>("actor_type").unwrap(),
            ActorType::Destination
        );
    }
}
