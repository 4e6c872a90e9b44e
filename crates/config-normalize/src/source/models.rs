//! Typed shapes of the config blobs, one per [`ConfigKind`].
//!
//! Enum-like fields stay as their raw string literals; the type mapper turns
//! them into relational enums so that an unknown literal is reported as such
//! rather than as a parse failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::ConfigKind;

/// A config shape stored under a single kind tag.
pub trait ConfigModel: serde::de::DeserializeOwned + Send {
    const KIND: ConfigKind;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardWorkspace {
    pub workspace_id: Uuid,
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub email: Option<String>,
    pub initial_setup_complete: bool,
    #[serde(default)]
    pub anonymous_data_collection: Option<bool>,
    #[serde(default)]
    pub news: Option<bool>,
    #[serde(default)]
    pub security_updates: Option<bool>,
    #[serde(default)]
    pub display_setup_wizard: Option<bool>,
    #[serde(default)]
    pub tombstone: Option<bool>,
    #[serde(default)]
    pub notifications: Option<Value>,
    #[serde(default)]
    pub first_completed_sync: Option<bool>,
    #[serde(default)]
    pub feedback_done: Option<bool>,
}

impl ConfigModel for StandardWorkspace {
    const KIND: ConfigKind = ConfigKind::StandardWorkspace;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardSourceDefinition {
    pub source_definition_id: Uuid,
    pub name: String,
    pub docker_repository: String,
    pub docker_image_tag: String,
    pub documentation_url: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub source_type: Option<String>,
    pub spec: Value,
}

impl ConfigModel for StandardSourceDefinition {
    const KIND: ConfigKind = ConfigKind::StandardSourceDefinition;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardDestinationDefinition {
    pub destination_definition_id: Uuid,
    pub name: String,
    pub docker_repository: String,
    pub docker_image_tag: String,
    pub documentation_url: String,
    #[serde(default)]
    pub icon: Option<String>,
    pub spec: Value,
}

impl ConfigModel for StandardDestinationDefinition {
    const KIND: ConfigKind = ConfigKind::StandardDestinationDefinition;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConnection {
    pub source_id: Uuid,
    pub workspace_id: Uuid,
    pub source_definition_id: Uuid,
    pub name: String,
    pub configuration: Value,
    #[serde(default)]
    pub tombstone: bool,
}

impl ConfigModel for SourceConnection {
    const KIND: ConfigKind = ConfigKind::SourceConnection;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationConnection {
    pub destination_id: Uuid,
    pub workspace_id: Uuid,
    pub destination_definition_id: Uuid,
    pub name: String,
    pub configuration: Value,
    #[serde(default)]
    pub tombstone: bool,
}

impl ConfigModel for DestinationConnection {
    const KIND: ConfigKind = ConfigKind::DestinationConnection;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceOAuthParameter {
    pub oauth_parameter_id: Uuid,
    pub source_definition_id: Uuid,
    #[serde(default)]
    pub workspace_id: Option<Uuid>,
    pub configuration: Value,
}

impl ConfigModel for SourceOAuthParameter {
    const KIND: ConfigKind = ConfigKind::SourceOauthParam;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationOAuthParameter {
    pub oauth_parameter_id: Uuid,
    pub destination_definition_id: Uuid,
    #[serde(default)]
    pub workspace_id: Option<Uuid>,
    pub configuration: Value,
}

impl ConfigModel for DestinationOAuthParameter {
    const KIND: ConfigKind = ConfigKind::DestinationOauthParam;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardSyncOperation {
    pub operation_id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub operator_type: String,
    #[serde(default)]
    pub operator_normalization: Option<Value>,
    #[serde(default)]
    pub operator_dbt: Option<Value>,
    #[serde(default)]
    pub tombstone: Option<bool>,
}

impl ConfigModel for StandardSyncOperation {
    const KIND: ConfigKind = ConfigKind::StandardSyncOperation;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardSync {
    pub connection_id: Uuid,
    #[serde(default = "default_namespace_definition")]
    pub namespace_definition: String,
    #[serde(default)]
    pub namespace_format: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    pub source_id: Uuid,
    pub destination_id: Uuid,
    #[serde(default)]
    pub operation_ids: Vec<Uuid>,
    pub name: String,
    pub catalog: Value,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub schedule: Option<Value>,
    #[serde(default)]
    pub manual: bool,
    #[serde(default)]
    pub resource_requirements: Option<Value>,
}

impl ConfigModel for StandardSync {
    const KIND: ConfigKind = ConfigKind::StandardSync;
}

fn default_namespace_definition() -> String {
    "source".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardSyncState {
    pub connection_id: Uuid,
    #[serde(default)]
    pub state: Option<Value>,
}

impl ConfigModel for StandardSyncState {
    const KIND: ConfigKind = ConfigKind::StandardSyncState;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sync_defaults() {
        let sync: StandardSync = serde_json::from_value(json!({
            "connectionId": "5f0d6a35-1d4a-4b1a-8f47-d7a3f0e8b7d4",
            "sourceId": "7b2f6e8a-27cd-4ec2-b0b4-2ab8a5c4de11",
            "destinationId": "c1e2b6d6-3bb2-4a8d-9ad3-6a2c4bb5e3f0",
            "name": "pg -> s3",
            "catalog": {"streams": []}
        }))
        .unwrap();

        assert_eq!(sync.namespace_definition, "source");
        assert!(sync.operation_ids.is_empty());
        assert!(!sync.manual);
        assert_eq!(sync.status, None);
        assert_eq!(sync.schedule, None);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let def: StandardDestinationDefinition = serde_json::from_value(json!({
            "destinationDefinitionId": "22f6c74f-5699-40ff-833c-4a879ea40133",
            "name": "BigQuery",
            "dockerRepository": "airbyte/destination-bigquery",
            "dockerImageTag": "0.5.0",
            "documentationUrl": "https://docs.airbyte.io/integrations/destinations/bigquery",
            "spec": {},
            "releaseStage": "beta"
        }))
        .unwrap();
        assert_eq!(def.icon, None);
    }

    #[test]
    fn test_enum_literal_kept_raw() {
        let def: StandardSourceDefinition = serde_json::from_value(json!({
            "sourceDefinitionId": "decd338e-5647-4c0b-adf4-da0e75f5a750",
            "name": "Postgres",
            "dockerRepository": "airbyte/source-postgres",
            "dockerImageTag": "0.3.11",
            "documentationUrl": "https://docs.airbyte.io/integrations/sources/postgres",
            "sourceType": "graphql",
            "spec": {}
        }))
        .unwrap();
        assert_eq!(def.source_type.as_deref(), Some("graphql"));
    }
}
