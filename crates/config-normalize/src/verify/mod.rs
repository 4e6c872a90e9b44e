//! Post-migration verification.
//!
//! Every target row is restored into the config shape it was built from and
//! compared, timestamps included, against the typed source record with the
//! same id. Join rows are compared as (connection, operation) pairs.

pub mod types;

pub use types::{TableVerifyResult, VerifyReport};

use crate::error::Result;
use crate::normalize::restore;
use crate::source::{
    extract_all, ConfigSource, ConfigWithMetadata, DestinationConnection,
    DestinationOAuthParameter, StandardDestinationDefinition, StandardSourceDefinition,
    StandardSync, StandardSyncOperation, StandardSyncState, StandardWorkspace, SourceConnection,
    SourceOAuthParameter,
};
use crate::target::schema;
use crate::target::{Row, TargetStore};
use crate::typemap::ActorType;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Compares the normalized tables against the generic config table.
pub struct Verifier<'a> {
    source: &'a dyn ConfigSource,
    target: &'a dyn TargetStore,
}

impl<'a> Verifier<'a> {
    pub fn new(source: &'a dyn ConfigSource, target: &'a dyn TargetStore) -> Self {
        Self { source, target }
    }

    /// Verify every target table.
    pub async fn verify(&self) -> Result<VerifyReport> {
        let start = Instant::now();

        let mut tables = vec![
            self.verify_workspaces().await?,
            self.verify_actor_definitions().await?,
            self.verify_actors().await?,
            self.verify_oauth_parameters().await?,
            self.verify_operations().await?,
        ];
        tables.extend(self.verify_connections().await?);
        tables.push(self.verify_states().await?);

        for table in &tables {
            if table.is_consistent() {
                info!(
                    "{}: verified {} rows",
                    table.table_name, table.target_row_count
                );
            } else {
                warn!(
                    "{}: source {} rows, target {} rows, {} missing, {} unexpected, {} mismatched",
                    table.table_name,
                    table.source_row_count,
                    table.target_row_count,
                    table.missing.len(),
                    table.unexpected.len(),
                    table.mismatched.len()
                );
            }
        }

        Ok(VerifyReport {
            tables,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn verify_workspaces(&self) -> Result<TableVerifyResult> {
        let table = schema::workspace();
        let mut result = TableVerifyResult::new(table.name);

        let expected = rekey(extract_all::<StandardWorkspace>(self.source).await?, |w| {
            w.workspace_id
        });
        let actual = restore_all(&self.target.fetch_rows(&table).await?, restore::workspace)?;
        compare(&mut result, expected, actual);
        Ok(result)
    }

    async fn verify_actor_definitions(&self) -> Result<TableVerifyResult> {
        let table = schema::actor_definition();
        let mut result = TableVerifyResult::new(table.name);
        let (sources, destinations) = split_by_actor_type(self.target.fetch_rows(&table).await?)?;

        let expected = rekey(
            extract_all::<StandardSourceDefinition>(self.source).await?,
            |d| d.source_definition_id,
        );
        compare(
            &mut result,
            expected,
            restore_all(&sources, restore::source_definition)?,
        );

        let expected = rekey(
            extract_all::<StandardDestinationDefinition>(self.source).await?,
            |d| d.destination_definition_id,
        );
        compare(
            &mut result,
            expected,
            restore_all(&destinations, restore::destination_definition)?,
        );
        Ok(result)
    }

    async fn verify_actors(&self) -> Result<TableVerifyResult> {
        let table = schema::actor();
        let mut result = TableVerifyResult::new(table.name);
        let (sources, destinations) = split_by_actor_type(self.target.fetch_rows(&table).await?)?;

        let expected = rekey(extract_all::<SourceConnection>(self.source).await?, |s| {
            s.source_id
        });
        compare(
            &mut result,
            expected,
            restore_all(&sources, restore::source_connection)?,
        );

        let expected = rekey(
            extract_all::<DestinationConnection>(self.source).await?,
            |d| d.destination_id,
        );
        compare(
            &mut result,
            expected,
            restore_all(&destinations, restore::destination_connection)?,
        );
        Ok(result)
    }

    async fn verify_oauth_parameters(&self) -> Result<TableVerifyResult> {
        let table = schema::actor_oauth_parameter();
        let mut result = TableVerifyResult::new(table.name);
        let (sources, destinations) = split_by_actor_type(self.target.fetch_rows(&table).await?)?;

        let expected = rekey(
            extract_all::<SourceOAuthParameter>(self.source).await?,
            |p| p.oauth_parameter_id,
        );
        compare(
            &mut result,
            expected,
            restore_all(&sources, restore::source_oauth_parameter)?,
        );

        let expected = rekey(
            extract_all::<DestinationOAuthParameter>(self.source).await?,
            |p| p.oauth_parameter_id,
        );
        compare(
            &mut result,
            expected,
            restore_all(&destinations, restore::destination_oauth_parameter)?,
        );
        Ok(result)
    }

    async fn verify_operations(&self) -> Result<TableVerifyResult> {
        let table = schema::operation();
        let mut result = TableVerifyResult::new(table.name);

        let expected = rekey(
            extract_all::<StandardSyncOperation>(self.source).await?,
            |o| o.operation_id,
        );
        let actual = restore_all(&self.target.fetch_rows(&table).await?, restore::operation)?;
        compare(&mut result, expected, actual);
        Ok(result)
    }

    /// Verifies the connection table and the join table together, since a
    /// restored sync needs its operation ids.
    async fn verify_connections(&self) -> Result<Vec<TableVerifyResult>> {
        let connection_table = schema::connection();
        let join_table = schema::connection_operation();
        let mut connections = TableVerifyResult::new(connection_table.name);
        let mut joins = TableVerifyResult::new(join_table.name);

        let mut expected = rekey(extract_all::<StandardSync>(self.source).await?, |s| {
            s.connection_id
        });
        for sync in &mut expected {
            sync.config.operation_ids.sort();
        }

        let join_rows = self.target.fetch_rows(&join_table).await?;
        let mut operations_by_connection: BTreeMap<Uuid, Vec<Uuid>> = BTreeMap::new();
        let mut actual_pairs: BTreeMap<(Uuid, Uuid), i64> = BTreeMap::new();
        for row in &join_rows {
            let connection_id = row.uuid("connection_id")?;
            let operation_id = row.uuid("operation_id")?;
            operations_by_connection
                .entry(connection_id)
                .or_default()
                .push(operation_id);
            *actual_pairs.entry((connection_id, operation_id)).or_default() += 1;
        }

        let mut actual = Vec::new();
        for row in &self.target.fetch_rows(&connection_table).await? {
            let mut ops = operations_by_connection
                .get(&row.uuid("id")?)
                .cloned()
                .unwrap_or_default();
            ops.sort();
            actual.push(restore::sync(row, ops)?);
        }

        let mut expected_pairs: BTreeMap<(Uuid, Uuid), i64> = BTreeMap::new();
        for sync in &expected {
            for op in &sync.config.operation_ids {
                *expected_pairs
                    .entry((sync.config.connection_id, *op))
                    .or_default() += 1;
            }
        }
        compare_pairs(&mut joins, &expected_pairs, &actual_pairs);

        compare(&mut connections, expected, actual);
        Ok(vec![connections, joins])
    }

    async fn verify_states(&self) -> Result<TableVerifyResult> {
        let table = schema::state();
        let mut result = TableVerifyResult::new(table.name);

        let expected = rekey(extract_all::<StandardSyncState>(self.source).await?, |s| {
            s.connection_id
        });
        let actual = restore_all(&self.target.fetch_rows(&table).await?, restore::sync_state)?;
        compare(&mut result, expected, actual);
        Ok(result)
    }
}

/// Replace each source config id with the canonical form of its typed id, so
/// both sides key the same way.
fn rekey<T>(
    configs: Vec<ConfigWithMetadata<T>>,
    id: impl Fn(&T) -> Uuid,
) -> Vec<ConfigWithMetadata<T>> {
    configs
        .into_iter()
        .map(|mut c| {
            c.config_id = id(&c.config).to_string();
            c
        })
        .collect()
}

fn restore_all<T>(
    rows: &[Row],
    restore: impl Fn(&Row) -> Result<ConfigWithMetadata<T>>,
) -> Result<Vec<ConfigWithMetadata<T>>> {
    rows.iter().map(restore).collect()
}

fn split_by_actor_type(rows: Vec<Row>) -> Result<(Vec<Row>, Vec<Row>)> {
    let mut sources = Vec::new();
    let mut destinations = Vec::new();
    for row in rows {
        match restore::actor_type(&row)? {
            ActorType::Source => sources.push(row),
            ActorType::Destination => destinations.push(row),
        }
    }
    Ok((sources, destinations))
}

fn compare<T: PartialEq>(
    result: &mut TableVerifyResult,
    expected: Vec<ConfigWithMetadata<T>>,
    actual: Vec<ConfigWithMetadata<T>>,
) {
    result.source_row_count += expected.len() as i64;
    result.target_row_count += actual.len() as i64;

    let mut actual: BTreeMap<String, ConfigWithMetadata<T>> = actual
        .into_iter()
        .map(|c| (c.config_id.clone(), c))
        .collect();

    for exp in expected {
        match actual.remove(&exp.config_id) {
            None => result.missing.push(exp.config_id),
            Some(act) if act != exp => result.mismatched.push(exp.config_id),
            Some(_) => {}
        }
    }
    result.unexpected.extend(actual.into_keys());
}

fn compare_pairs(
    result: &mut TableVerifyResult,
    expected: &BTreeMap<(Uuid, Uuid), i64>,
    actual: &BTreeMap<(Uuid, Uuid), i64>,
) {
    result.source_row_count = expected.values().sum();
    result.target_row_count = actual.values().sum();

    let describe = |(c, o): &(Uuid, Uuid)| format!("{}/{}", c, o);
    for (pair, count) in expected {
        match actual.get(pair) {
            None => result.missing.push(describe(pair)),
            Some(n) if n != count => result.mismatched.push(describe(pair)),
            Some(_) => {}
        }
    }
    for pair in actual.keys() {
        if !expected.contains_key(pair) {
            result.unexpected.push(describe(pair));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{Entity, Normalizer};
    use crate::source::{ConfigKind, ConfigRecord};
    use crate::target::{MemoryStore, SqlValue};
    use crate::typemap::enum_types;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    async fn migrated(records: Vec<ConfigRecord>) -> MemoryStore {
        let store = MemoryStore::with_configs(records);
        for def in enum_types() {
            store.create_enum_type(&def).await.unwrap();
        }
        for table in schema::all_tables() {
            store.create_table(&table).await.unwrap();
        }
        let normalizer = Normalizer::new(&store, &store);
        for entity in [Entity::Workspace, Entity::Operation] {
            normalizer.populate(entity).await.unwrap();
        }
        store
    }

    fn records(ws: Uuid, op: Uuid) -> Vec<ConfigRecord> {
        let ts = Utc.with_ymd_and_hms(2021, 5, 1, 12, 0, 0).unwrap();
        vec![
            ConfigRecord::new(
                ConfigKind::StandardWorkspace,
                ws.to_string().to_uppercase(),
                ts,
                ts,
                json!({"workspaceId": ws, "name": "w", "slug": "w", "initialSetupComplete": false}),
            ),
            ConfigRecord::new(
                ConfigKind::StandardSyncOperation,
                op.to_string(),
                ts,
                ts,
                json!({
                    "operationId": op,
                    "workspaceId": ws,
                    "name": "dbt",
                    "operatorType": "dbt",
                    "operatorDbt": {"gitRepoUrl": "https://example.com/repo.git"}
                }),
            ),
        ]
    }

    #[tokio::test]
    async fn test_consistent_after_population() {
        let store = migrated(records(Uuid::new_v4(), Uuid::new_v4())).await;
        let report = Verifier::new(&store, &store).verify().await.unwrap();

        assert!(report.is_consistent(), "{}", report.summary());
        assert_eq!(report.tables.len(), 8);
    }

    #[tokio::test]
    async fn test_detects_extra_target_row() {
        let ws = Uuid::new_v4();
        let store = migrated(records(ws, Uuid::new_v4())).await;

        let now = Utc::now();
        let extra = Row::new()
            .with("id", Uuid::new_v4())
            .with("workspace_id", ws)
            .with("name", "stray")
            .with("operator_type", SqlValue::Enum("normalization".into()))
            .with("created_at", now)
            .with("updated_at", now);
        store.insert_row(&schema::operation(), &extra).await.unwrap();

        let report = Verifier::new(&store, &store).verify().await.unwrap();
        assert!(!report.is_consistent());
        assert_eq!(report.inconsistent_tables(), vec!["operation"]);
        let op = &report.tables[4];
        assert_eq!(op.unexpected.len(), 1);
        assert_eq!(op.target_row_count, 2);
    }

    #[test]
    fn test_compare_flags_changed_timestamps() {
        let id = Uuid::new_v4();
        let config = StandardSyncState {
            connection_id: id,
            state: None,
        };
        let expected = ConfigWithMetadata {
            config_id: id.to_string(),
            created_at: Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
            config,
        };
        let mut actual = expected.clone();
        actual.updated_at = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();

        let mut result = TableVerifyResult::new("state");
        compare(&mut result, vec![expected], vec![actual]);
        assert_eq!(result.mismatched, vec![id.to_string()]);
    }
}
