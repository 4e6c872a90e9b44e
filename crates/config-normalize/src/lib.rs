//! # config-normalize
//!
//! One-time normalization of a generic key-value config table into dedicated
//! relational tables on PostgreSQL.
//!
//! Each record of the generic table carries a kind tag and a JSON blob. This
//! library:
//!
//! - **Extracts** typed configs per kind tag
//! - **Maps** enum-like blob literals onto named PostgreSQL enum types
//! - **Creates** the target enum types and tables upfront, in dependency order
//! - **Populates** each table so that every foreign key target exists first
//! - **Verifies** the result by restoring configs from the written rows
//! - **Records** the applied version so the migration runs exactly once
//!
//! The whole run is a single transaction: any failure leaves the target
//! schema as it was.
//!
//! ## Example
//!
//! ```rust,no_run
//! use config_normalize::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> config_normalize::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::from_config(&config).await?;
//!     let result = orchestrator.run().await?;
//!     println!("Wrote {} rows", result.rows_written);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod history;
pub mod normalize;
pub mod orchestrator;
pub mod source;
pub mod target;
pub mod typemap;
pub mod verify;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, TargetConfig};
pub use error::{MigrateError, Result};
pub use history::{AppliedMigration, HistoryBackend, MIGRATION_VERSION};
pub use normalize::{Entity, Normalizer, TableOutcome};
pub use orchestrator::{MigrationResult, Orchestrator, Phase, ProgressReporter};
pub use source::{ConfigKind, ConfigRecord, ConfigSource};
pub use target::{MemoryStore, PgStore, Row, SqlValue, TargetStore};
pub use verify::{Verifier, VerifyReport};
