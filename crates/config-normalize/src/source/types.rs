//! Generic config record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind tag stored in the `config_type` column of the generic config table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigKind {
    StandardWorkspace,
    StandardSourceDefinition,
    StandardDestinationDefinition,
    SourceConnection,
    DestinationConnection,
    SourceOauthParam,
    DestinationOauthParam,
    StandardSyncOperation,
    StandardSync,
    StandardSyncState,
}

impl ConfigKind {
    /// The literal stored in `config_type`.
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKind::StandardWorkspace => "STANDARD_WORKSPACE",
            ConfigKind::StandardSourceDefinition => "STANDARD_SOURCE_DEFINITION",
            ConfigKind::StandardDestinationDefinition => "STANDARD_DESTINATION_DEFINITION",
            ConfigKind::SourceConnection => "SOURCE_CONNECTION",
            ConfigKind::DestinationConnection => "DESTINATION_CONNECTION",
            ConfigKind::SourceOauthParam => "SOURCE_OAUTH_PARAM",
            ConfigKind::DestinationOauthParam => "DESTINATION_OAUTH_PARAM",
            ConfigKind::StandardSyncOperation => "STANDARD_SYNC_OPERATION",
            ConfigKind::StandardSync => "STANDARD_SYNC",
            ConfigKind::StandardSyncState => "STANDARD_SYNC_STATE",
        }
    }

    /// Every kind this migration reads.
    pub fn all() -> [ConfigKind; 10] {
        [
            ConfigKind::StandardWorkspace,
            ConfigKind::StandardSourceDefinition,
            ConfigKind::StandardDestinationDefinition,
            ConfigKind::SourceConnection,
            ConfigKind::DestinationConnection,
            ConfigKind::SourceOauthParam,
            ConfigKind::DestinationOauthParam,
            ConfigKind::StandardSyncOperation,
            ConfigKind::StandardSync,
            ConfigKind::StandardSyncState,
        ]
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the generic config table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigRecord {
    /// Opaque id, usually a UUID string.
    pub config_id: String,

    /// Kind tag.
    pub config_type: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Raw JSON payload.
    pub config_blob: serde_json::Value,
}

impl ConfigRecord {
    /// Build a record of a known kind.
    pub fn new(
        kind: ConfigKind,
        config_id: impl Into<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        config_blob: serde_json::Value,
    ) -> Self {
        Self {
            config_id: config_id.into(),
            config_type: kind.as_str().to_string(),
            created_at,
            updated_at,
            config_blob,
        }
    }
}

/// A typed config together with the timestamps of the record it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigWithMetadata<T> {
    pub config_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub config: T,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_literal_matches_serde() {
        for kind in ConfigKind::all() {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::String(kind.as_str().to_string()));
        }
    }

    #[test]
    fn test_oauth_kind_literal() {
        assert_eq!(ConfigKind::SourceOauthParam.as_str(), "SOURCE_OAUTH_PARAM");
        assert_eq!(ConfigKind::StandardSyncState.to_string(), "STANDARD_SYNC_STATE");
    }
}
