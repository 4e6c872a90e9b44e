//! Target table definitions and PostgreSQL DDL generation.
//!
//! [`all_tables`] returns the eight normalized tables in creation order. The
//! order is checked by the orchestrator: a foreign key may only reference a
//! table that appears earlier.

use crate::typemap::{
    enum_types, ActorType, EnumTypeDef, NamespaceDefinitionType, OperatorType, PgEnum, SourceType,
    StatusType,
};

use super::{Row, SqlValue};

pub const WORKSPACE: &str = "workspace";
pub const ACTOR_DEFINITION: &str = "actor_definition";
pub const ACTOR: &str = "actor";
pub const ACTOR_OAUTH_PARAMETER: &str = "actor_oauth_parameter";
pub const OPERATION: &str = "operation";
pub const CONNECTION: &str = "connection";
pub const CONNECTION_OPERATION: &str = "connection_operation";
pub const STATE: &str = "state";

/// Column data type in the target schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Uuid,
    Varchar(u32),
    Boolean,
    Jsonb,
    TimestampTz,
    /// Named enum type in the target schema.
    Enum(&'static str),
}

impl ColumnType {
    /// SQL type as written in DDL.
    pub fn sql_type(&self, schema: &str) -> String {
        match self {
            ColumnType::Uuid => "uuid".to_string(),
            ColumnType::Varchar(n) => format!("varchar({})", n),
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::Jsonb => "jsonb".to_string(),
            ColumnType::TimestampTz => "timestamp with time zone".to_string(),
            ColumnType::Enum(name) => qualify(schema, name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDef {
    pub column: &'static str,
    pub ref_table: &'static str,
    pub ref_column: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: &'static str,
    pub column: &'static str,
}

/// Shape of one target table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<&'static str>,
    pub foreign_keys: Vec<ForeignKeyDef>,
    pub indexes: Vec<IndexDef>,
}

impl TableDef {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Primary key values of `row`, in key column order.
    pub fn key_of(&self, row: &Row) -> Vec<SqlValue> {
        self.primary_key
            .iter()
            .map(|col| row.get(col).clone())
            .collect()
    }

    /// Human-readable primary key, e.g. `(id)=(...)`.
    pub fn describe_key(&self, row: &Row) -> String {
        let values: Vec<String> = self.key_of(row).iter().map(SqlValue::display).collect();
        format!("({})=({})", self.primary_key.join(", "), values.join(", "))
    }

    /// Tables this table references.
    pub fn references(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.foreign_keys.iter().map(|fk| fk.ref_table)
    }
}

fn col(name: &'static str, column_type: ColumnType) -> ColumnDef {
    ColumnDef {
        name,
        column_type,
        nullable: false,
    }
}

fn nullable(name: &'static str, column_type: ColumnType) -> ColumnDef {
    ColumnDef {
        name,
        column_type,
        nullable: true,
    }
}

fn fk(column: &'static str, ref_table: &'static str) -> ForeignKeyDef {
    ForeignKeyDef {
        column,
        ref_table,
        ref_column: "id",
    }
}

fn index(name: &'static str, column: &'static str) -> IndexDef {
    IndexDef { name, column }
}

const NAME: ColumnType = ColumnType::Varchar(256);

fn timestamps() -> [ColumnDef; 2] {
    [
        col("created_at", ColumnType::TimestampTz),
        col("updated_at", ColumnType::TimestampTz),
    ]
}

pub fn workspace() -> TableDef {
    let mut columns = vec![
        col("id", ColumnType::Uuid),
        nullable("customer_id", ColumnType::Uuid),
        col("name", NAME),
        col("slug", NAME),
        nullable("email", NAME),
        col("initial_setup_complete", ColumnType::Boolean),
        nullable("anonymous_data_collection", ColumnType::Boolean),
        nullable("news", ColumnType::Boolean),
        nullable("security_updates", ColumnType::Boolean),
        nullable("display_setup_wizard", ColumnType::Boolean),
        nullable("tombstone", ColumnType::Boolean),
        nullable("notifications", ColumnType::Jsonb),
        nullable("first_completed_sync", ColumnType::Boolean),
        nullable("feedback_done", ColumnType::Boolean),
    ];
    columns.extend(timestamps());

    TableDef {
        name: WORKSPACE,
        columns,
        primary_key: vec!["id"],
        foreign_keys: vec![],
        indexes: vec![],
    }
}

pub fn actor_definition() -> TableDef {
    let mut columns = vec![
        col("id", ColumnType::Uuid),
        col("name", NAME),
        col("docker_repository", NAME),
        col("docker_image_tag", NAME),
        col("documentation_url", NAME),
        nullable("icon", NAME),
        col("actor_type", ColumnType::Enum(ActorType::TYPE_NAME)),
        nullable("source_type", ColumnType::Enum(SourceType::TYPE_NAME)),
        col("spec", ColumnType::Jsonb),
    ];
    columns.extend(timestamps());

    TableDef {
        name: ACTOR_DEFINITION,
        columns,
        primary_key: vec!["id"],
        foreign_keys: vec![],
        indexes: vec![index("actor_definition_actor_type_idx", "actor_type")],
    }
}

pub fn actor() -> TableDef {
    let mut columns = vec![
        col("id", ColumnType::Uuid),
        col("workspace_id", ColumnType::Uuid),
        col("actor_definition_id", ColumnType::Uuid),
        col("name", NAME),
        col("configuration", ColumnType::Jsonb),
        col("actor_type", ColumnType::Enum(ActorType::TYPE_NAME)),
        col("tombstone", ColumnType::Boolean),
    ];
    columns.extend(timestamps());

    TableDef {
        name: ACTOR,
        columns,
        primary_key: vec!["id"],
        foreign_keys: vec![
            fk("workspace_id", WORKSPACE),
            fk("actor_definition_id", ACTOR_DEFINITION),
        ],
        indexes: vec![
            index("actor_actor_type_idx", "actor_type"),
            index("actor_actor_definition_id_idx", "actor_definition_id"),
        ],
    }
}

pub fn actor_oauth_parameter() -> TableDef {
    let mut columns = vec![
        col("id", ColumnType::Uuid),
        nullable("workspace_id", ColumnType::Uuid),
        col("actor_definition_id", ColumnType::Uuid),
        col("configuration", ColumnType::Jsonb),
        col("actor_type", ColumnType::Enum(ActorType::TYPE_NAME)),
    ];
    columns.extend(timestamps());

    TableDef {
        name: ACTOR_OAUTH_PARAMETER,
        columns,
        primary_key: vec!["id"],
        foreign_keys: vec![
            fk("workspace_id", WORKSPACE),
            fk("actor_definition_id", ACTOR_DEFINITION),
        ],
        indexes: vec![index("actor_oauth_parameter_actor_type_idx", "actor_type")],
    }
}

pub fn operation() -> TableDef {
    let mut columns = vec![
        col("id", ColumnType::Uuid),
        col("workspace_id", ColumnType::Uuid),
        col("name", NAME),
        col("operator_type", ColumnType::Enum(OperatorType::TYPE_NAME)),
        nullable("operator_normalization", ColumnType::Jsonb),
        nullable("operator_dbt", ColumnType::Jsonb),
        nullable("tombstone", ColumnType::Boolean),
    ];
    columns.extend(timestamps());

    TableDef {
        name: OPERATION,
        columns,
        primary_key: vec!["id"],
        foreign_keys: vec![fk("workspace_id", WORKSPACE)],
        indexes: vec![],
    }
}

pub fn connection() -> TableDef {
    let mut columns = vec![
        col("id", ColumnType::Uuid),
        col(
            "namespace_definition",
            ColumnType::Enum(NamespaceDefinitionType::TYPE_NAME),
        ),
        nullable("namespace_format", NAME),
        nullable("prefix", NAME),
        col("source_id", ColumnType::Uuid),
        col("destination_id", ColumnType::Uuid),
        col("name", NAME),
        col("catalog", ColumnType::Jsonb),
        nullable("status", ColumnType::Enum(StatusType::TYPE_NAME)),
        nullable("schedule", ColumnType::Jsonb),
        col("manual", ColumnType::Boolean),
        nullable("resource_requirements", ColumnType::Jsonb),
    ];
    columns.extend(timestamps());

    TableDef {
        name: CONNECTION,
        columns,
        primary_key: vec!["id"],
        foreign_keys: vec![fk("source_id", ACTOR), fk("destination_id", ACTOR)],
        indexes: vec![
            index("connection_source_id_idx", "source_id"),
            index("connection_destination_id_idx", "destination_id"),
        ],
    }
}

pub fn connection_operation() -> TableDef {
    let mut columns = vec![
        col("id", ColumnType::Uuid),
        col("connection_id", ColumnType::Uuid),
        col("operation_id", ColumnType::Uuid),
    ];
    columns.extend(timestamps());

    TableDef {
        name: CONNECTION_OPERATION,
        columns,
        primary_key: vec!["id", "connection_id", "operation_id"],
        foreign_keys: vec![
            fk("connection_id", CONNECTION),
            fk("operation_id", OPERATION),
        ],
        indexes: vec![],
    }
}

pub fn state() -> TableDef {
    let mut columns = vec![
        col("id", ColumnType::Uuid),
        col("connection_id", ColumnType::Uuid),
        nullable("state", ColumnType::Jsonb),
    ];
    columns.extend(timestamps());

    TableDef {
        name: STATE,
        columns,
        primary_key: vec!["id", "connection_id"],
        foreign_keys: vec![fk("connection_id", CONNECTION)],
        indexes: vec![],
    }
}

/// All target tables in creation order.
pub fn all_tables() -> Vec<TableDef> {
    vec![
        workspace(),
        actor_definition(),
        actor(),
        actor_oauth_parameter(),
        operation(),
        connection(),
        connection_operation(),
        state(),
    ]
}

/// Quote a PostgreSQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Fully qualify a table or type name.
pub fn qualify(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// DDL creating an enum type, tolerating an existing one.
pub fn create_enum_sql(schema: &str, def: &EnumTypeDef) -> String {
    let literals: Vec<String> = def.literals.iter().map(|l| quote_literal(l)).collect();
    format!(
        "DO $$ BEGIN\n    CREATE TYPE {} AS ENUM ({});\nEXCEPTION\n    WHEN duplicate_object THEN NULL;\nEND $$",
        qualify(schema, def.name),
        literals.join(", ")
    )
}

/// DDL creating a table with its primary and foreign keys.
pub fn create_table_sql(schema: &str, table: &TableDef) -> String {
    let mut lines: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            let nullable = if c.nullable { "" } else { " NOT NULL" };
            format!(
                "    {} {}{}",
                quote_ident(c.name),
                c.column_type.sql_type(schema),
                nullable
            )
        })
        .collect();

    let pk_cols: Vec<String> = table.primary_key.iter().map(|c| quote_ident(c)).collect();
    lines.push(format!("    PRIMARY KEY ({})", pk_cols.join(", ")));

    for fk in &table.foreign_keys {
        lines.push(format!(
            "    FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_ident(fk.column),
            qualify(schema, fk.ref_table),
            quote_ident(fk.ref_column)
        ));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
        qualify(schema, table.name),
        lines.join(",\n")
    )
}

/// DDL creating one secondary index.
pub fn create_index_sql(schema: &str, table: &TableDef, idx: &IndexDef) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
        quote_ident(idx.name),
        qualify(schema, table.name),
        quote_ident(idx.column)
    )
}

/// Parameterized INSERT for every column of `table`, in column order.
///
/// Enum parameters are sent as text and cast server-side.
pub fn insert_sql(schema: &str, table: &TableDef) -> String {
    let cols: Vec<String> = table.columns.iter().map(|c| quote_ident(c.name)).collect();
    let placeholders: Vec<String> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| match c.column_type {
            ColumnType::Enum(name) => format!("${}::text::{}", i + 1, qualify(schema, name)),
            _ => format!("${}", i + 1),
        })
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualify(schema, table.name),
        cols.join(", "),
        placeholders.join(", ")
    )
}

/// SELECT of every column of `table`; enum columns come back as text.
pub fn select_sql(schema: &str, table: &TableDef) -> String {
    let cols: Vec<String> = table
        .columns
        .iter()
        .map(|c| match c.column_type {
            ColumnType::Enum(_) => format!("{}::text AS {}", quote_ident(c.name), quote_ident(c.name)),
            _ => quote_ident(c.name),
        })
        .collect();

    format!("SELECT {} FROM {}", cols.join(", "), qualify(schema, table.name))
}

/// The full DDL script of the migration: enum types, then tables and their
/// indexes in creation order.
pub fn migration_script(schema: &str) -> String {
    let mut statements: Vec<String> = enum_types()
        .iter()
        .map(|def| create_enum_sql(schema, def))
        .collect();

    for table in all_tables() {
        statements.push(create_table_sql(schema, &table));
        for idx in &table.indexes {
            statements.push(create_index_sql(schema, &table, idx));
        }
    }

    let mut script = statements.join(";\n\n");
    script.push_str(";\n");
    script
}
