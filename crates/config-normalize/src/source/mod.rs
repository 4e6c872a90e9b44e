//! Generic config table access and typed extraction.

pub mod models;
mod types;

pub use models::*;
pub use types::*;

use crate::error::{MigrateError, Result};
use async_trait::async_trait;
use tracing::debug;

/// Trait for reading the generic config table.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Return every record whose `config_type` equals `config_type`.
    async fn list_configs(&self, config_type: &str) -> Result<Vec<ConfigRecord>>;

    /// Get the source type name for logging.
    fn source_type(&self) -> &'static str;
}

/// Read every record of `T::KIND` and deserialize its blob into `T`.
///
/// Order follows whatever the source returns. A blob that does not parse
/// aborts the extraction with [`MigrateError::Deserialization`].
pub async fn extract_all<T: ConfigModel>(
    source: &dyn ConfigSource,
) -> Result<Vec<ConfigWithMetadata<T>>> {
    let records = source.list_configs(T::KIND.as_str()).await?;
    debug!("Read {} {} records", records.len(), T::KIND);

    records.into_iter().map(decode::<T>).collect()
}

/// Deserialize a single generic record into its typed shape.
pub fn decode<T: ConfigModel>(record: ConfigRecord) -> Result<ConfigWithMetadata<T>> {
    let ConfigRecord {
        config_id,
        config_type,
        created_at,
        updated_at,
        config_blob,
    } = record;

    let config = serde_json::from_value::<T>(config_blob).map_err(|source| {
        MigrateError::Deserialization {
            config_type,
            config_id: config_id.clone(),
            source,
        }
    })?;

    Ok(ConfigWithMetadata {
        config_id,
        created_at,
        updated_at,
        config,
    })
}
