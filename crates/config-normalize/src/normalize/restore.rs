//! Rebuild config shapes from normalized rows.
//!
//! The inverse of [`super::rows`], using the reverse enum mappings. Restored
//! configs compare equal to the configs they were written from, which is how
//! a run is verified.

use crate::error::Result;
use crate::source::{
    ConfigWithMetadata, DestinationConnection, DestinationOAuthParameter,
    StandardDestinationDefinition, StandardSourceDefinition, StandardSync, StandardSyncOperation,
    StandardSyncState, StandardWorkspace, SourceConnection, SourceOAuthParameter,
};
use crate::target::Row;
use crate::typemap::{
    namespace_definition_to_config, operator_type_to_config, source_type_to_config,
    status_to_config, ActorType, NamespaceDefinitionType, OperatorType, SourceType, StatusType,
};
use uuid::Uuid;

fn with_meta<T>(row: &Row, config_id: Uuid, config: T) -> Result<ConfigWithMetadata<T>> {
    Ok(ConfigWithMetadata {
        config_id: config_id.to_string(),
        created_at: row.timestamp("created_at")?,
        updated_at: row.timestamp("updated_at")?,
        config,
    })
}

/// Actor kind of an actor, actor definition or oauth parameter row.
pub fn actor_type(row: &Row) -> Result<ActorType> {
    row.enum_value::<ActorType>("actor_type")
}

pub fn workspace(row: &Row) -> Result<ConfigWithMetadata<StandardWorkspace>> {
    let id = row.uuid("id")?;
    let ws = StandardWorkspace {
        workspace_id: id,
        customer_id: row.opt_uuid("customer_id")?,
        name: row.text("name")?,
        slug: row.text("slug")?,
        email: row.opt_text("email")?,
        initial_setup_complete: row.bool("initial_setup_complete")?,
        anonymous_data_collection: row.opt_bool("anonymous_data_collection")?,
        news: row.opt_bool("news")?,
        security_updates: row.opt_bool("security_updates")?,
        display_setup_wizard: row.opt_bool("display_setup_wizard")?,
        tombstone: row.opt_bool("tombstone")?,
        notifications: row.opt_json("notifications")?,
        first_completed_sync: row.opt_bool("first_completed_sync")?,
        feedback_done: row.opt_bool("feedback_done")?,
    };
    with_meta(row, id, ws)
}

pub fn source_definition(row: &Row) -> Result<ConfigWithMetadata<StandardSourceDefinition>> {
    let id = row.uuid("id")?;
    let def = StandardSourceDefinition {
        source_definition_id: id,
        name: row.text("name")?,
        docker_repository: row.text("docker_repository")?,
        docker_image_tag: row.text("docker_image_tag")?,
        documentation_url: row.text("documentation_url")?,
        icon: row.opt_text("icon")?,
        source_type: row
            .opt_enum_value::<SourceType>("source_type")?
            .map(|t| source_type_to_config(t).to_string()),
        spec: row.json("spec")?,
    };
    with_meta(row, id, def)
}

pub fn destination_definition(
    row: &Row,
) -> Result<ConfigWithMetadata<StandardDestinationDefinition>> {
    let id = row.uuid("id")?;
    let def = StandardDestinationDefinition {
        destination_definition_id: id,
        name: row.text("name")?,
        docker_repository: row.text("docker_repository")?,
        docker_image_tag: row.text("docker_image_tag")?,
        documentation_url: row.text("documentation_url")?,
        icon: row.opt_text("icon")?,
        spec: row.json("spec")?,
    };
    with_meta(row, id, def)
}

pub fn source_connection(row: &Row) -> Result<ConfigWithMetadata<SourceConnection>> {
    let id = row.uuid("id")?;
    let src = SourceConnection {
        source_id: id,
        workspace_id: row.uuid("workspace_id")?,
        source_definition_id: row.uuid("actor_definition_id")?,
        name: row.text("name")?,
        configuration: row.json("configuration")?,
        tombstone: row.bool("tombstone")?,
    };
    with_meta(row, id, src)
}

pub fn destination_connection(row: &Row) -> Result<ConfigWithMetadata<DestinationConnection>> {
    let id = row.uuid("id")?;
    let dst = DestinationConnection {
        destination_id: id,
        workspace_id: row.uuid("workspace_id")?,
        destination_definition_id: row.uuid("actor_definition_id")?,
        name: row.text("name")?,
        configuration: row.json("configuration")?,
        tombstone: row.bool("tombstone")?,
    };
    with_meta(row, id, dst)
}

pub fn source_oauth_parameter(row: &Row) -> Result<ConfigWithMetadata<SourceOAuthParameter>> {
    let id = row.uuid("id")?;
    let param = SourceOAuthParameter {
        oauth_parameter_id: id,
        source_definition_id: row.uuid("actor_definition_id")?,
        workspace_id: row.opt_uuid("workspace_id")?,
        configuration: row.json("configuration")?,
    };
    with_meta(row, id, param)
}

pub fn destination_oauth_parameter(
    row: &Row,
) -> Result<ConfigWithMetadata<DestinationOAuthParameter>> {
    let id = row.uuid("id")?;
    let param = DestinationOAuthParameter {
        oauth_parameter_id: id,
        destination_definition_id: row.uuid("actor_definition_id")?,
        workspace_id: row.opt_uuid("workspace_id")?,
        configuration: row.json("configuration")?,
    };
    with_meta(row, id, param)
}

pub fn operation(row: &Row) -> Result<ConfigWithMetadata<StandardSyncOperation>> {
    let id = row.uuid("id")?;
    let op = StandardSyncOperation {
        operation_id: id,
        workspace_id: row.uuid("workspace_id")?,
        name: row.text("name")?,
        operator_type: operator_type_to_config(row.enum_value::<OperatorType>("operator_type")?)
            .to_string(),
        operator_normalization: row.opt_json("operator_normalization")?,
        operator_dbt: row.opt_json("operator_dbt")?,
        tombstone: row.opt_bool("tombstone")?,
    };
    with_meta(row, id, op)
}

/// Rebuild a sync from its connection row and the operation ids found in the
/// join table.
pub fn sync(row: &Row, operation_ids: Vec<Uuid>) -> Result<ConfigWithMetadata<StandardSync>> {
    let id = row.uuid("id")?;
    let namespace_definition =
        row.enum_value::<NamespaceDefinitionType>("namespace_definition")?;
    let sync = StandardSync {
        connection_id: id,
        namespace_definition: namespace_definition_to_config(namespace_definition).to_string(),
        namespace_format: row.opt_text("namespace_format")?,
        prefix: row.opt_text("prefix")?,
        source_id: row.uuid("source_id")?,
        destination_id: row.uuid("destination_id")?,
        operation_ids,
        name: row.text("name")?,
        catalog: row.json("catalog")?,
        status: row
            .opt_enum_value::<StatusType>("status")?
            .map(|s| status_to_config(s).to_string()),
        schedule: row.opt_json("schedule")?,
        manual: row.bool("manual")?,
        resource_requirements: row.opt_json("resource_requirements")?,
    };
    with_meta(row, id, sync)
}

/// Rebuild a sync state. The config id is the connection id; the row's
/// generated id has no counterpart in the config.
pub fn sync_state(row: &Row) -> Result<ConfigWithMetadata<StandardSyncState>> {
    let connection_id = row.uuid("connection_id")?;
    let st = StandardSyncState {
        connection_id,
        state: row.opt_json("state")?,
    };
    with_meta(row, connection_id, st)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::rows;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn meta<T>(config_id: Uuid, config: T) -> ConfigWithMetadata<T> {
        ConfigWithMetadata {
            config_id: config_id.to_string(),
            created_at: Utc.with_ymd_and_hms(2020, 12, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2021, 2, 1, 0, 0, 0).unwrap(),
            config,
        }
    }

    #[test]
    fn test_source_definition_restores_original() {
        let id = Uuid::new_v4();
        for source_type in [Some("database".to_string()), None] {
            let original = meta(
                id,
                StandardSourceDefinition {
                    source_definition_id: id,
                    name: "Postgres".to_string(),
                    docker_repository: "airbyte/source-postgres".to_string(),
                    docker_image_tag: "0.3.11".to_string(),
                    documentation_url: "https://docs.airbyte.io".to_string(),
                    icon: Some("<svg/>".to_string()),
                    source_type,
                    spec: json!({"connectionSpecification": {}}),
                },
            );
            let row = rows::source_definition(&original).unwrap();
            assert_eq!(source_definition(&row).unwrap(), original);
            assert_eq!(actor_type(&row).unwrap(), ActorType::Source);
        }
    }

    #[test]
    fn test_sync_restores_with_operations() {
        let id = Uuid::new_v4();
        let ops = vec![Uuid::new_v4()];
        let original = meta(
            id,
            StandardSync {
                connection_id: id,
                namespace_definition: "destination".to_string(),
                namespace_format: None,
                prefix: Some("raw_".to_string()),
                source_id: Uuid::new_v4(),
                destination_id: Uuid::new_v4(),
                operation_ids: ops.clone(),
                name: "sync".to_string(),
                catalog: json!({"streams": []}),
                status: Some("deprecated".to_string()),
                schedule: Some(json!({"units": 24, "timeUnit": "hours"})),
                manual: false,
                resource_requirements: None,
            },
        );
        let row = rows::connection(&original).unwrap();
        assert_eq!(sync(&row, ops).unwrap(), original);
    }

    #[test]
    fn test_state_restores_connection_id_as_config_id() {
        let connection_id = Uuid::new_v4();
        let original = meta(
            connection_id,
            StandardSyncState {
                connection_id,
                state: None,
            },
        );
        let row = rows::state(&original);
        assert_eq!(sync_state(&row).unwrap(), original);
    }
}
