//! Error types for the normalization library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Target database connection or query error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// A config blob carried an enum literal with no relational mapping.
    #[error("Unrecognized value '{value}' for enum {enum_name}")]
    UnrecognizedEnumValue {
        enum_name: &'static str,
        value: String,
    },

    /// A config blob did not parse into the shape its kind tag promises.
    #[error("Failed to deserialize {config_type} record {config_id}: {source}")]
    Deserialization {
        config_type: String,
        config_id: String,
        #[source]
        source: serde_json::Error,
    },

    /// A referencing row was rejected because its referenced row is absent.
    #[error("Referential integrity violation on table {table}: {message}")]
    ReferentialIntegrity { table: String, message: String },

    /// Primary key already present in the target table.
    #[error("Duplicate key {key} in table {table}")]
    DuplicateKey { table: String, key: String },

    /// NOT NULL, type or enum-membership violation.
    #[error("Constraint violation on table {table}: {message}")]
    Constraint { table: String, message: String },

    /// Tables are ordered so that a reference precedes its target.
    #[error("Invalid table order: {0}")]
    InvalidOrder(String),

    /// The migration version is already recorded in the history table.
    #[error("Migration {version} has already been applied. Use --force to run it again.")]
    AlreadyApplied { version: String },

    /// Post-population verification found differences.
    #[error("Verification failed: {0}")]
    Verification(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Constraint error
    pub fn constraint(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Constraint {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a ReferentialIntegrity error
    pub fn referential(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::ReferentialIntegrity {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Map a tokio-postgres error raised while writing `table` onto the
    /// integrity variants when the server reports a constraint SQLSTATE.
    pub fn from_pg_write(table: &str, err: tokio_postgres::Error) -> Self {
        use tokio_postgres::error::SqlState;

        let Some(db) = err.as_db_error() else {
            return MigrateError::Target(err);
        };

        let code = db.code();
        if *code == SqlState::FOREIGN_KEY_VIOLATION {
            MigrateError::referential(table, db.message())
        } else if *code == SqlState::UNIQUE_VIOLATION {
            MigrateError::DuplicateKey {
                table: table.to_string(),
                key: db.detail().unwrap_or(db.message()).to_string(),
            }
        } else if *code == SqlState::NOT_NULL_VIOLATION
            || *code == SqlState::INVALID_TEXT_REPRESENTATION
        {
            MigrateError::constraint(table, db.message())
        } else {
            MigrateError::Target(err)
        }
    }

    /// Process exit code for this error category.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 1,
            MigrateError::Target(_) | MigrateError::Pool { .. } => 2,
            MigrateError::UnrecognizedEnumValue { .. } | MigrateError::Deserialization { .. } => 3,
            MigrateError::ReferentialIntegrity { .. }
            | MigrateError::DuplicateKey { .. }
            | MigrateError::Constraint { .. }
            | MigrateError::InvalidOrder(_) => 4,
            MigrateError::AlreadyApplied { .. } => 5,
            MigrateError::Verification(_) => 6,
            MigrateError::Io(_) => 7,
            MigrateError::Json(_) => 8,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
