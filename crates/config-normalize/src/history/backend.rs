//! History backend trait.
//!
//! The orchestrator works with `Arc<dyn HistoryBackend>` without knowing
//! where the history lives:
//!
//! - **PostgreSQL**: [`DbHistoryBackend`](super::DbHistoryBackend)
//! - **Memory**: [`MemoryHistoryBackend`](super::MemoryHistoryBackend), for
//!   dry runs and tests

use async_trait::async_trait;

use super::AppliedMigration;
use crate::error::Result;

/// Trait for applied-migration history storage.
///
/// Implementations must be `Send + Sync` to allow sharing across async tasks.
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Create the history storage. Idempotent.
    async fn init_schema(&self) -> Result<()>;

    /// The entry recorded for `version`, if any.
    async fn applied(&self, version: &str) -> Result<Option<AppliedMigration>>;

    /// Record an applied migration, replacing an earlier entry of the same
    /// version.
    async fn record(&self, entry: &AppliedMigration) -> Result<()>;

    /// Get the backend type name for logging.
    fn backend_type(&self) -> &'static str;
}
