//! Table population: extract typed configs, build rows, insert them.

pub mod restore;
pub mod rows;

use crate::error::Result;
use crate::source::{
    extract_all, ConfigKind, ConfigModel, ConfigSource, ConfigWithMetadata,
    DestinationConnection, DestinationOAuthParameter, StandardDestinationDefinition,
    StandardSourceDefinition, StandardSync, StandardSyncOperation, StandardSyncState,
    StandardWorkspace, SourceConnection, SourceOAuthParameter,
};
use crate::target::schema::{self, TableDef};
use crate::target::{Row, TargetStore};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// One normalized entity. Each populates one table, except
/// [`Entity::Connection`] which also fills the connection/operation join table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Workspace,
    ActorDefinition,
    Actor,
    ActorOauthParameter,
    Operation,
    Connection,
    State,
}

impl Entity {
    /// Main table populated by this entity.
    pub fn table(self) -> TableDef {
        match self {
            Entity::Workspace => schema::workspace(),
            Entity::ActorDefinition => schema::actor_definition(),
            Entity::Actor => schema::actor(),
            Entity::ActorOauthParameter => schema::actor_oauth_parameter(),
            Entity::Operation => schema::operation(),
            Entity::Connection => schema::connection(),
            Entity::State => schema::state(),
        }
    }

    /// Every table this entity writes to.
    pub fn tables(self) -> Vec<TableDef> {
        match self {
            Entity::Connection => vec![schema::connection(), schema::connection_operation()],
            other => vec![other.table()],
        }
    }

    /// Config kinds read to populate this entity.
    pub fn source_kinds(self) -> &'static [ConfigKind] {
        match self {
            Entity::Workspace => &[ConfigKind::StandardWorkspace],
            Entity::ActorDefinition => &[
                ConfigKind::StandardSourceDefinition,
                ConfigKind::StandardDestinationDefinition,
            ],
            Entity::Actor => &[
                ConfigKind::SourceConnection,
                ConfigKind::DestinationConnection,
            ],
            Entity::ActorOauthParameter => &[
                ConfigKind::SourceOauthParam,
                ConfigKind::DestinationOauthParam,
            ],
            Entity::Operation => &[ConfigKind::StandardSyncOperation],
            Entity::Connection => &[ConfigKind::StandardSync],
            Entity::State => &[ConfigKind::StandardSyncState],
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table().name)
    }
}

/// Rows written to one table by one population step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableOutcome {
    pub table: String,
    pub source_kinds: Vec<ConfigKind>,
    pub rows_written: u64,
}

/// Populates target tables from the generic config table.
pub struct Normalizer<'a> {
    source: &'a dyn ConfigSource,
    target: &'a dyn TargetStore,
}

impl<'a> Normalizer<'a> {
    pub fn new(source: &'a dyn ConfigSource, target: &'a dyn TargetStore) -> Self {
        Self { source, target }
    }

    /// Populate the table(s) of one entity. Tables must already exist.
    pub async fn populate(&self, entity: Entity) -> Result<Vec<TableOutcome>> {
        let outcomes = match entity {
            Entity::Workspace => {
                let table = schema::workspace();
                let batch = self.build::<StandardWorkspace, _>(|m| Ok(rows::workspace(m))).await?;
                vec![self.write(&table, entity.source_kinds(), batch).await?]
            }
            Entity::ActorDefinition => {
                let table = schema::actor_definition();
                let mut batch = self
                    .build::<StandardSourceDefinition, _>(rows::source_definition)
                    .await?;
                batch.extend(
                    self.build::<StandardDestinationDefinition, _>(|m| {
                        Ok(rows::destination_definition(m))
                    })
                    .await?,
                );
                vec![self.write(&table, entity.source_kinds(), batch).await?]
            }
            Entity::Actor => {
                let table = schema::actor();
                let mut batch = self
                    .build::<SourceConnection, _>(|m| Ok(rows::source_actor(m)))
                    .await?;
                batch.extend(
                    self.build::<DestinationConnection, _>(|m| Ok(rows::destination_actor(m)))
                        .await?,
                );
                vec![self.write(&table, entity.source_kinds(), batch).await?]
            }
            Entity::ActorOauthParameter => {
                let table = schema::actor_oauth_parameter();
                let mut batch = self
                    .build::<SourceOAuthParameter, _>(|m| Ok(rows::source_oauth_parameter(m)))
                    .await?;
                batch.extend(
                    self.build::<DestinationOAuthParameter, _>(|m| {
                        Ok(rows::destination_oauth_parameter(m))
                    })
                    .await?,
                );
                vec![self.write(&table, entity.source_kinds(), batch).await?]
            }
            Entity::Operation => {
                let table = schema::operation();
                let batch = self.build::<StandardSyncOperation, _>(rows::operation).await?;
                vec![self.write(&table, entity.source_kinds(), batch).await?]
            }
            Entity::Connection => self.populate_connections().await?,
            Entity::State => {
                let table = schema::state();
                let batch = self
                    .build::<StandardSyncState, _>(|m| Ok(rows::state(m)))
                    .await?;
                vec![self.write(&table, entity.source_kinds(), batch).await?]
            }
        };

        Ok(outcomes)
    }

    /// Connections are written first, then one join row per referenced
    /// operation.
    async fn populate_connections(&self) -> Result<Vec<TableOutcome>> {
        let syncs = extract_all::<StandardSync>(self.source).await?;

        let mut connection_rows = Vec::with_capacity(syncs.len());
        let mut join_rows = Vec::new();
        for sync in &syncs {
            connection_rows.push(rows::connection(sync)?);
            join_rows.extend(rows::connection_operations(sync));
        }

        let kinds = Entity::Connection.source_kinds();
        let connections = self
            .write(&schema::connection(), kinds, connection_rows)
            .await?;
        let joins = self
            .write(&schema::connection_operation(), kinds, join_rows)
            .await?;
        Ok(vec![connections, joins])
    }

    /// Extract every record of `T` and turn each into a row.
    async fn build<T, F>(&self, to_row: F) -> Result<Vec<Row>>
    where
        T: ConfigModel,
        F: Fn(&ConfigWithMetadata<T>) -> Result<Row>,
    {
        let configs = extract_all::<T>(self.source).await?;
        configs.iter().map(to_row).collect()
    }

    async fn write(
        &self,
        table: &TableDef,
        kinds: &[ConfigKind],
        rows: Vec<Row>,
    ) -> Result<TableOutcome> {
        for row in &rows {
            debug!("Inserting into {} {}", table.name, table.describe_key(row));
            self.target.insert_row(table, row).await?;
        }

        info!("{}: {} rows written", table.name, rows.len());
        Ok(TableOutcome {
            table: table.name.to_string(),
            source_kinds: kinds.to_vec(),
            rows_written: rows.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrateError;
    use crate::source::ConfigRecord;
    use crate::target::MemoryStore;
    use crate::typemap::enum_types;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    async fn prepared(records: Vec<ConfigRecord>) -> MemoryStore {
        let store = MemoryStore::with_configs(records);
        for def in enum_types() {
            store.create_enum_type(&def).await.unwrap();
        }
        for table in schema::all_tables() {
            store.create_table(&table).await.unwrap();
        }
        store
    }

    fn record(kind: ConfigKind, id: Uuid, blob: serde_json::Value) -> ConfigRecord {
        ConfigRecord::new(kind, id.to_string(), Utc::now(), Utc::now(), blob)
    }

    fn workspace_record(id: Uuid) -> ConfigRecord {
        record(
            ConfigKind::StandardWorkspace,
            id,
            json!({
                "workspaceId": id,
                "name": "default",
                "slug": "default",
                "initialSetupComplete": true
            }),
        )
    }

    #[test]
    fn test_connection_entity_writes_join_table() {
        let names: Vec<&str> = Entity::Connection.tables().iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["connection", "connection_operation"]);
        assert_eq!(Entity::Actor.to_string(), "actor");
    }

    #[tokio::test]
    async fn test_populate_workspace() {
        let store = prepared(vec![workspace_record(Uuid::new_v4())]).await;
        let normalizer = Normalizer::new(&store, &store);

        let outcomes = normalizer.populate(Entity::Workspace).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].table, "workspace");
        assert_eq!(outcomes[0].rows_written, 1);
        assert_eq!(store.row_count("workspace").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_second_population_is_duplicate_key() {
        let store = prepared(vec![workspace_record(Uuid::new_v4())]).await;
        let normalizer = Normalizer::new(&store, &store);

        normalizer.populate(Entity::Workspace).await.unwrap();
        let err = normalizer.populate(Entity::Workspace).await.unwrap_err();
        assert!(matches!(err, MigrateError::DuplicateKey { .. }));
    }

    #[tokio::test]
    async fn test_operation_before_workspace_violates_reference() {
        let ws = Uuid::new_v4();
        let op = Uuid::new_v4();
        let store = prepared(vec![
            workspace_record(ws),
            record(
                ConfigKind::StandardSyncOperation,
                op,
                json!({
                    "operationId": op,
                    "workspaceId": ws,
                    "name": "normalize",
                    "operatorType": "normalization"
                }),
            ),
        ])
        .await;
        let normalizer = Normalizer::new(&store, &store);

        let err = normalizer.populate(Entity::Operation).await.unwrap_err();
        assert!(matches!(err, MigrateError::ReferentialIntegrity { .. }));
    }
}
