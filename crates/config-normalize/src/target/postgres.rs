//! PostgreSQL store: reads the generic config table and writes the
//! normalized tables.
//!
//! The store checks out one pooled connection at connect time and issues
//! every statement on it, so `BEGIN`/`COMMIT` bracket the whole run. The
//! migration history shares that connection through [`PgStore::client`].

use crate::config::{MigrationConfig, TargetConfig};
use crate::error::{MigrateError, Result};
use crate::source::{ConfigKind, ConfigRecord, ConfigSource};
use crate::target::schema::{self, qualify, ColumnType, TableDef};
use crate::target::{Row, SqlValue, TargetStore};
use crate::typemap::EnumTypeDef;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tokio_postgres::types::ToSql;
use tokio_postgres::Config as PgConfig;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of probing the target database.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub connected: bool,
    pub latency_ms: u64,
    pub source_table_exists: bool,
    /// Record count per kind tag in the generic config table.
    pub config_counts: BTreeMap<String, i64>,
    pub error: Option<String>,
}

impl HealthCheckResult {
    pub fn healthy(&self) -> bool {
        self.connected && self.source_table_exists && self.error.is_none()
    }
}

/// PostgreSQL implementation of [`ConfigSource`] and [`TargetStore`].
pub struct PgStore {
    client: Object,
    schema: String,
    source_table: String,
}

impl PgStore {
    /// Build the pool and check out the connection used for the run.
    pub async fn connect(target: &TargetConfig, migration: &MigrationConfig) -> Result<Self> {
        let pool = Self::build_pool(target, migration.max_connections)?;

        let client = pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "connecting to PostgreSQL target"))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL target: {}:{}/{}",
            target.host, target.port, target.database
        );

        Ok(Self {
            client,
            schema: target.schema.clone(),
            source_table: migration.source_table.clone(),
        })
    }

    fn build_pool(target: &TargetConfig, max_conns: usize) -> Result<Pool> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&target.host);
        pg_config.port(target.port);
        pg_config.dbname(&target.database);
        pg_config.user(&target.user);
        pg_config.password(&target.password);

        if target.ssl_mode == "disable" {
            warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
        }

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);

        Pool::builder(mgr)
            .max_size(max_conns)
            .build()
            .map_err(|e| MigrateError::pool(e, "creating PostgreSQL pool"))
    }

    /// The connection every statement of the run goes through.
    pub(crate) fn client(&self) -> &Object {
        &self.client
    }

    /// Probe connectivity and report what the generic config table holds.
    ///
    /// Never fails: connection problems are reported in the result.
    pub async fn health_check(target: &TargetConfig, migration: &MigrationConfig) -> HealthCheckResult {
        let start = Instant::now();
        let mut result = HealthCheckResult {
            connected: false,
            latency_ms: 0,
            source_table_exists: false,
            config_counts: BTreeMap::new(),
            error: None,
        };

        let store = match Self::connect(target, migration).await {
            Ok(store) => store,
            Err(e) => {
                result.latency_ms = start.elapsed().as_millis() as u64;
                result.error = Some(e.to_string());
                return result;
            }
        };
        result.connected = true;
        result.latency_ms = start.elapsed().as_millis() as u64;

        match store.relation_exists(&store.source_table).await {
            Ok(exists) => result.source_table_exists = exists,
            Err(e) => {
                result.error = Some(e.to_string());
                return result;
            }
        }

        if result.source_table_exists {
            match store.config_counts().await {
                Ok(counts) => result.config_counts = counts,
                Err(e) => result.error = Some(e.to_string()),
            }
        }

        result
    }

    async fn relation_exists(&self, name: &str) -> Result<bool> {
        let row = self
            .client
            .query_one(
                "SELECT EXISTS (
                    SELECT 1 FROM information_schema.tables
                    WHERE table_schema = $1 AND table_name = $2
                )",
                &[&self.schema, &name],
            )
            .await?;
        Ok(row.get(0))
    }

    async fn config_counts(&self) -> Result<BTreeMap<String, i64>> {
        let query = format!(
            "SELECT config_type, COUNT(*)::int8 FROM {} GROUP BY config_type",
            qualify(&self.schema, &self.source_table)
        );

        let mut counts: BTreeMap<String, i64> = ConfigKind::all()
            .iter()
            .map(|k| (k.as_str().to_string(), 0))
            .collect();
        for row in self.client.query(query.as_str(), &[]).await? {
            counts.insert(row.get(0), row.get(1));
        }
        Ok(counts)
    }
}

/// Convert a row value into a parameter typed after its target column.
fn to_param(
    table: &str,
    column: &str,
    column_type: ColumnType,
    value: &SqlValue,
) -> Result<Box<dyn ToSql + Sync + Send>> {
    let param: Box<dyn ToSql + Sync + Send> = match (column_type, value) {
        (ColumnType::Uuid, SqlValue::Null) => Box::new(None::<Uuid>),
        (ColumnType::Uuid, SqlValue::Uuid(u)) => Box::new(Some(*u)),
        (ColumnType::Varchar(_), SqlValue::Null) => Box::new(None::<String>),
        (ColumnType::Varchar(_), SqlValue::Text(s)) => Box::new(Some(s.clone())),
        (ColumnType::Boolean, SqlValue::Null) => Box::new(None::<bool>),
        (ColumnType::Boolean, SqlValue::Bool(b)) => Box::new(Some(*b)),
        (ColumnType::Jsonb, SqlValue::Null) => Box::new(None::<serde_json::Value>),
        (ColumnType::Jsonb, SqlValue::Json(v)) => Box::new(Some(v.clone())),
        (ColumnType::TimestampTz, SqlValue::Null) => Box::new(None::<DateTime<Utc>>),
        (ColumnType::TimestampTz, SqlValue::Timestamp(t)) => Box::new(Some(*t)),
        (ColumnType::Enum(_), SqlValue::Null) => Box::new(None::<String>),
        (ColumnType::Enum(_), SqlValue::Enum(s)) => Box::new(Some(s.clone())),
        (expected, found) => {
            return Err(MigrateError::constraint(
                table,
                format!("column {} expects {:?}, got {:?}", column, expected, found),
            ))
        }
    };
    Ok(param)
}

/// Read one column of a fetched row back into a [`SqlValue`].
fn from_pg(row: &tokio_postgres::Row, idx: usize, column_type: ColumnType) -> Result<SqlValue> {
    let value = match column_type {
        ColumnType::Uuid => row.try_get::<_, Option<Uuid>>(idx)?.into(),
        ColumnType::Varchar(_) => row.try_get::<_, Option<String>>(idx)?.into(),
        ColumnType::Boolean => row.try_get::<_, Option<bool>>(idx)?.into(),
        ColumnType::Jsonb => row.try_get::<_, Option<serde_json::Value>>(idx)?.into(),
        ColumnType::TimestampTz => row.try_get::<_, Option<DateTime<Utc>>>(idx)?.into(),
        ColumnType::Enum(_) => row
            .try_get::<_, Option<String>>(idx)?
            .map(SqlValue::Enum)
            .unwrap_or(SqlValue::Null),
    };
    Ok(value)
}

#[async_trait]
impl ConfigSource for PgStore {
    async fn list_configs(&self, config_type: &str) -> Result<Vec<ConfigRecord>> {
        let query = format!(
            "SELECT config_id, config_type, created_at, updated_at, config_blob
             FROM {} WHERE config_type = $1",
            qualify(&self.schema, &self.source_table)
        );

        let rows = self.client.query(query.as_str(), &[&config_type]).await?;
        let records = rows
            .iter()
            .map(|row| -> Result<ConfigRecord> {
                Ok(ConfigRecord {
                    config_id: row.try_get(0)?,
                    config_type: row.try_get(1)?,
                    created_at: row.try_get(2)?,
                    updated_at: row.try_get(3)?,
                    config_blob: row.try_get(4)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Fetched {} {} records", records.len(), config_type);
        Ok(records)
    }

    fn source_type(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl TargetStore for PgStore {
    async fn begin(&self) -> Result<()> {
        self.client.batch_execute("BEGIN").await?;
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.client.batch_execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.client.batch_execute("ROLLBACK").await?;
        Ok(())
    }

    async fn create_enum_type(&self, def: &EnumTypeDef) -> Result<()> {
        let sql = schema::create_enum_sql(&self.schema, def);
        debug!("{}", sql);
        self.client.batch_execute(&sql).await?;
        Ok(())
    }

    async fn create_table(&self, table: &TableDef) -> Result<()> {
        let sql = schema::create_table_sql(&self.schema, table);
        debug!("{}", sql);
        self.client.batch_execute(&sql).await?;

        for idx in &table.indexes {
            let sql = schema::create_index_sql(&self.schema, table, idx);
            debug!("{}", sql);
            self.client.batch_execute(&sql).await?;
        }
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        self.relation_exists(table).await
    }

    async fn insert_row(&self, table: &TableDef, row: &Row) -> Result<()> {
        let params = table
            .columns
            .iter()
            .map(|c| to_param(table.name, c.name, c.column_type, row.get(c.name)))
            .collect::<Result<Vec<_>>>()?;
        let refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        let sql = schema::insert_sql(&self.schema, table);
        self.client
            .execute(sql.as_str(), &refs)
            .await
            .map_err(|e| MigrateError::from_pg_write(table.name, e))?;
        Ok(())
    }

    async fn fetch_rows(&self, table: &TableDef) -> Result<Vec<Row>> {
        let sql = schema::select_sql(&self.schema, table);
        let pg_rows = self.client.query(sql.as_str(), &[]).await?;

        let mut rows = Vec::with_capacity(pg_rows.len());
        for pg_row in &pg_rows {
            let mut row = Row::new();
            for (idx, col) in table.columns.iter().enumerate() {
                row.set(col.name, from_pg(pg_row, idx, col.column_type)?);
            }
            rows.push(row);
        }
        Ok(rows)
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let query = format!("SELECT COUNT(*)::int8 FROM {}", qualify(&self.schema, table));
        let row = self.client.query_one(query.as_str(), &[]).await?;
        Ok(row.get(0))
    }

    fn db_type(&self) -> &'static str {
        "postgres"
    }
}
