//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Target database configuration (PostgreSQL). The generic config table
    /// lives in the same database.
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Target database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database type (always "postgres").
    #[serde(default = "default_postgres")]
    pub r#type: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Schema holding both the generic config table and the new tables
    /// (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// SSL mode (default: "disable"). Only "disable" and "prefer" are
    /// supported since connections are made without TLS.
    #[serde(default = "default_disable")]
    pub ssl_mode: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Name of the generic configuration table (default: "airbyte_configs").
    #[serde(default = "default_source_table")]
    pub source_table: String,

    /// Re-read every populated table and compare it against the source
    /// records before committing (default: true).
    #[serde(default = "default_true")]
    pub verify_after_run: bool,

    /// Schema for the migration history table (default: "_config_normalize").
    #[serde(default = "default_history_schema")]
    pub history_schema: String,

    /// Maximum PostgreSQL connections in the pool (default: 2). A run
    /// holds a single connection, shared with the migration history.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            source_table: default_source_table(),
            verify_after_run: true,
            history_schema: default_history_schema(),
            max_connections: default_max_connections(),
        }
    }
}

// Default value functions for serde
fn default_postgres() -> String {
    "postgres".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_disable() -> String {
    "disable".to_string()
}

fn default_source_table() -> String {
    "airbyte_configs".to_string()
}

fn default_history_schema() -> String {
    "_config_normalize".to_string()
}

fn default_max_connections() -> usize {
    2
}

fn default_true() -> bool {
    true
}
