//! Row construction: one function per config shape.
//!
//! Every row carries the `created_at`/`updated_at` of the record it came from.
//! Join and state rows get a freshly generated id.

use crate::error::Result;
use crate::source::{
    ConfigWithMetadata, DestinationConnection, DestinationOAuthParameter,
    StandardDestinationDefinition, StandardSourceDefinition, StandardSync, StandardSyncOperation,
    StandardSyncState, StandardWorkspace, SourceConnection, SourceOAuthParameter,
};
use crate::target::{Row, SqlValue};
use crate::typemap::{
    namespace_definition_from_config, operator_type_from_config, source_type_from_config,
    status_from_config, ActorType,
};
use uuid::Uuid;

fn stamped<T>(meta: &ConfigWithMetadata<T>) -> Row {
    Row::new()
        .with("created_at", meta.created_at)
        .with("updated_at", meta.updated_at)
}

pub fn workspace(meta: &ConfigWithMetadata<StandardWorkspace>) -> Row {
    let ws = &meta.config;
    stamped(meta)
        .with("id", ws.workspace_id)
        .with("customer_id", ws.customer_id)
        .with("name", ws.name.as_str())
        .with("slug", ws.slug.as_str())
        .with("email", ws.email.clone())
        .with("initial_setup_complete", ws.initial_setup_complete)
        .with("anonymous_data_collection", ws.anonymous_data_collection)
        .with("news", ws.news)
        .with("security_updates", ws.security_updates)
        .with("display_setup_wizard", ws.display_setup_wizard)
        .with("tombstone", ws.tombstone)
        .with("notifications", ws.notifications.clone())
        .with("first_completed_sync", ws.first_completed_sync)
        .with("feedback_done", ws.feedback_done)
}

pub fn source_definition(meta: &ConfigWithMetadata<StandardSourceDefinition>) -> Result<Row> {
    let def = &meta.config;
    let source_type = match def.source_type.as_deref() {
        Some(literal) => SqlValue::from_enum(source_type_from_config(literal)?),
        None => SqlValue::Null,
    };

    Ok(stamped(meta)
        .with("id", def.source_definition_id)
        .with("name", def.name.as_str())
        .with("docker_repository", def.docker_repository.as_str())
        .with("docker_image_tag", def.docker_image_tag.as_str())
        .with("documentation_url", def.documentation_url.as_str())
        .with("icon", def.icon.clone())
        .with("actor_type", SqlValue::from_enum(ActorType::Source))
        .with("source_type", source_type)
        .with("spec", def.spec.clone()))
}

/// Destination definitions never carry a source type.
pub fn destination_definition(meta: &ConfigWithMetadata<StandardDestinationDefinition>) -> Row {
    let def = &meta.config;
    stamped(meta)
        .with("id", def.destination_definition_id)
        .with("name", def.name.as_str())
        .with("docker_repository", def.docker_repository.as_str())
        .with("docker_image_tag", def.docker_image_tag.as_str())
        .with("documentation_url", def.documentation_url.as_str())
        .with("icon", def.icon.clone())
        .with("actor_type", SqlValue::from_enum(ActorType::Destination))
        .with("source_type", SqlValue::Null)
        .with("spec", def.spec.clone())
}

pub fn source_actor(meta: &ConfigWithMetadata<SourceConnection>) -> Row {
    let src = &meta.config;
    stamped(meta)
        .with("id", src.source_id)
        .with("workspace_id", src.workspace_id)
        .with("actor_definition_id", src.source_definition_id)
        .with("name", src.name.as_str())
        .with("configuration", src.configuration.clone())
        .with("actor_type", SqlValue::from_enum(ActorType::Source))
        .with("tombstone", src.tombstone)
}

pub fn destination_actor(meta: &ConfigWithMetadata<DestinationConnection>) -> Row {
    let dst = &meta.config;
    stamped(meta)
        .with("id", dst.destination_id)
        .with("workspace_id", dst.workspace_id)
        .with("actor_definition_id", dst.destination_definition_id)
        .with("name", dst.name.as_str())
        .with("configuration", dst.configuration.clone())
        .with("actor_type", SqlValue::from_enum(ActorType::Destination))
        .with("tombstone", dst.tombstone)
}

pub fn source_oauth_parameter(meta: &ConfigWithMetadata<SourceOAuthParameter>) -> Row {
    let param = &meta.config;
    stamped(meta)
        .with("id", param.oauth_parameter_id)
        .with("workspace_id", param.workspace_id)
        .with("actor_definition_id", param.source_definition_id)
        .with("configuration", param.configuration.clone())
        .with("actor_type", SqlValue::from_enum(ActorType::Source))
}

pub fn destination_oauth_parameter(meta: &ConfigWithMetadata<DestinationOAuthParameter>) -> Row {
    let param = &meta.config;
    stamped(meta)
        .with("id", param.oauth_parameter_id)
        .with("workspace_id", param.workspace_id)
        .with("actor_definition_id", param.destination_definition_id)
        .with("configuration", param.configuration.clone())
        .with("actor_type", SqlValue::from_enum(ActorType::Destination))
}

pub fn operation(meta: &ConfigWithMetadata<StandardSyncOperation>) -> Result<Row> {
    let op = &meta.config;
    let operator_type = operator_type_from_config(&op.operator_type)?;

    Ok(stamped(meta)
        .with("id", op.operation_id)
        .with("workspace_id", op.workspace_id)
        .with("name", op.name.as_str())
        .with("operator_type", SqlValue::from_enum(operator_type))
        .with("operator_normalization", op.operator_normalization.clone())
        .with("operator_dbt", op.operator_dbt.clone())
        .with("tombstone", op.tombstone))
}

pub fn connection(meta: &ConfigWithMetadata<StandardSync>) -> Result<Row> {
    let sync = &meta.config;
    let namespace_definition = namespace_definition_from_config(&sync.namespace_definition)?;
    let status = match sync.status.as_deref() {
        Some(literal) => SqlValue::from_enum(status_from_config(literal)?),
        None => SqlValue::Null,
    };

    Ok(stamped(meta)
        .with("id", sync.connection_id)
        .with("namespace_definition", SqlValue::from_enum(namespace_definition))
        .with("namespace_format", sync.namespace_format.clone())
        .with("prefix", sync.prefix.clone())
        .with("source_id", sync.source_id)
        .with("destination_id", sync.destination_id)
        .with("name", sync.name.as_str())
        .with("catalog", sync.catalog.clone())
        .with("status", status)
        .with("schedule", sync.schedule.clone())
        .with("manual", sync.manual)
        .with("resource_requirements", sync.resource_requirements.clone()))
}

/// One join row per referenced operation, in the order the sync lists them.
pub fn connection_operations(meta: &ConfigWithMetadata<StandardSync>) -> Vec<Row> {
    let sync = &meta.config;
    sync.operation_ids
        .iter()
        .map(|operation_id| {
            stamped(meta)
                .with("id", Uuid::new_v4())
                .with("connection_id", sync.connection_id)
                .with("operation_id", *operation_id)
        })
        .collect()
}

pub fn state(meta: &ConfigWithMetadata<StandardSyncState>) -> Row {
    let st = &meta.config;
    stamped(meta)
        .with("id", Uuid::new_v4())
        .with("connection_id", st.connection_id)
        .with("state", st.state.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrateError;
    use crate::typemap::{NamespaceDefinitionType, SourceType, StatusType};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn meta<T>(config: T) -> ConfigWithMetadata<T> {
        ConfigWithMetadata {
            config_id: "ignored".to_string(),
            created_at: Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2021, 6, 7, 8, 9, 10).unwrap(),
            config,
        }
    }

    fn sync(operation_ids: Vec<Uuid>) -> StandardSync {
        StandardSync {
            connection_id: Uuid::new_v4(),
            namespace_definition: "customformat".to_string(),
            namespace_format: Some("${SOURCE_NAMESPACE}".to_string()),
            prefix: None,
            source_id: Uuid::new_v4(),
            destination_id: Uuid::new_v4(),
            operation_ids,
            name: "sync".to_string(),
            catalog: json!({"streams": []}),
            status: Some("active".to_string()),
            schedule: None,
            manual: true,
            resource_requirements: None,
        }
    }

    #[test]
    fn test_source_definition_maps_source_type() {
        let def = StandardSourceDefinition {
            source_definition_id: Uuid::new_v4(),
            name: "Stripe".to_string(),
            docker_repository: "airbyte/source-stripe".to_string(),
            docker_image_tag: "0.1.0".to_string(),
            documentation_url: "https://docs.airbyte.io".to_string(),
            icon: None,
            source_type: Some("api".to_string()),
            spec: json!({}),
        };
        let row = source_definition(&meta(def)).unwrap();
        assert_eq!(row.enum_value::<SourceType>("source_type").unwrap(), SourceType::Api);
        assert_eq!(row.enum_value::<ActorType>("actor_type").unwrap(), ActorType::Source);
        assert_eq!(row.get("icon"), &SqlValue::Null);
    }

    #[test]
    fn test_source_definition_unknown_type_fails() {
        let def = StandardSourceDefinition {
            source_definition_id: Uuid::new_v4(),
            name: "Weird".to_string(),
            docker_repository: "airbyte/source-weird".to_string(),
            docker_image_tag: "0.1.0".to_string(),
            documentation_url: "https://docs.airbyte.io".to_string(),
            icon: None,
            source_type: Some("graphql".to_string()),
            spec: json!({}),
        };
        match source_definition(&meta(def)) {
            Err(MigrateError::UnrecognizedEnumValue { enum_name, value }) => {
                assert_eq!(enum_name, "source_type");
                assert_eq!(value, "graphql");
            }
            other => panic!("expected UnrecognizedEnumValue, got {:?}", other),
        }
    }

    #[test]
    fn test_destination_definition_leaves_source_type_null() {
        let def = StandardDestinationDefinition {
            destination_definition_id: Uuid::new_v4(),
            name: "S3".to_string(),
            docker_repository: "airbyte/destination-s3".to_string(),
            docker_image_tag: "0.1.0".to_string(),
            documentation_url: "https://docs.airbyte.io".to_string(),
            icon: Some("<svg/>".to_string()),
            spec: json!({}),
        };
        let row = destination_definition(&meta(def));
        assert!(row.get("source_type").is_null());
        assert_eq!(
            row.enum_value::<ActorType>("actor_type").unwrap(),
            ActorType::Destination
        );
    }

    #[test]
    fn test_connection_row_and_timestamps() {
        let m = meta(sync(vec![]));
        let row = connection(&m).unwrap();
        assert_eq!(
            row.enum_value::<NamespaceDefinitionType>("namespace_definition")
                .unwrap(),
            NamespaceDefinitionType::CustomFormat
        );
        assert_eq!(row.enum_value::<StatusType>("status").unwrap(), StatusType::Active);
        assert_eq!(row.timestamp("created_at").unwrap(), m.created_at);
        assert_eq!(row.timestamp("updated_at").unwrap(), m.updated_at);
        assert!(row.bool("manual").unwrap());
    }

    #[test]
    fn test_connection_operations_get_fresh_ids() {
        let ops = vec![Uuid::new_v4(), Uuid::new_v4()];
        let m = meta(sync(ops.clone()));
        let rows = connection_operations(&m);

        assert_eq!(rows.len(), 2);
        assert_ne!(rows[0].uuid("id").unwrap(), rows[1].uuid("id").unwrap());
        for (row, op) in rows.iter().zip(&ops) {
            assert_eq!(row.uuid("operation_id").unwrap(), *op);
            assert_eq!(row.uuid("connection_id").unwrap(), m.config.connection_id);
            assert_eq!(row.timestamp("created_at").unwrap(), m.created_at);
        }
    }

    #[test]
    fn test_state_row_gets_generated_id() {
        let connection_id = Uuid::new_v4();
        let row = state(&meta(StandardSyncState {
            connection_id,
            state: Some(json!({"cursor": "2021-01-01"})),
        }));
        assert_ne!(row.uuid("id").unwrap(), connection_id);
        assert_eq!(row.uuid("connection_id").unwrap(), connection_id);
    }
}
