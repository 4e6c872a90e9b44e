//! Type mapping between config-blob enum literals and PostgreSQL enum types.
//!
//! Config blobs carry enum-like fields as plain string literals. Each of them
//! maps onto a named PostgreSQL enum type in the target schema. The forward
//! direction (config -> relational) is fallible because a blob may hold a
//! literal introduced upstream after this migration was written; the reverse
//! direction is total and exists so that migrated rows can be restored and
//! compared against their source records.

use crate::error::{MigrateError, Result};

/// A Rust enum that is stored as a named PostgreSQL enum type.
pub trait PgEnum: Sized + Copy + PartialEq + 'static {
    /// Name of the PostgreSQL type.
    const TYPE_NAME: &'static str;

    /// Every variant, in declaration order.
    const VARIANTS: &'static [Self];

    /// Stable string literal stored in the database.
    fn literal(self) -> &'static str;

    /// Parse a literal read back from the database.
    fn from_literal(literal: &str) -> Result<Self> {
        Self::VARIANTS
            .iter()
            .copied()
            .find(|v| v.literal() == literal)
            .ok_or_else(|| MigrateError::UnrecognizedEnumValue {
                enum_name: Self::TYPE_NAME,
                value: literal.to_string(),
            })
    }
}

/// Literals of a PostgreSQL enum type, in declaration order.
pub fn literals<E: PgEnum>() -> Vec<&'static str> {
    E::VARIANTS.iter().map(|v| v.literal()).collect()
}

/// Definition of a named enum type to create in the target schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumTypeDef {
    pub name: &'static str,
    pub literals: Vec<&'static str>,
}

fn enum_type_def<E: PgEnum>() -> EnumTypeDef {
    EnumTypeDef {
        name: E::TYPE_NAME,
        literals: literals::<E>(),
    }
}

/// All enum types used by the target tables, in creation order.
pub fn enum_types() -> Vec<EnumTypeDef> {
    vec![
        enum_type_def::<SourceType>(),
        enum_type_def::<ActorType>(),
        enum_type_def::<OperatorType>(),
        enum_type_def::<NamespaceDefinitionType>(),
        enum_type_def::<StatusType>(),
    ]
}

/// Category of a source connector definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceType {
    Api,
    File,
    Database,
    Custom,
}

impl PgEnum for SourceType {
    const TYPE_NAME: &'static str = "source_type";
    const VARIANTS: &'static [Self] = &[Self::Api, Self::File, Self::Database, Self::Custom];

    fn literal(self) -> &'static str {
        match self {
            SourceType::Api => "api",
            SourceType::File => "file",
            SourceType::Database => "database",
            SourceType::Custom => "custom",
        }
    }
}

/// Whether a definition, actor or oauth parameter is a source or a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorType {
    Source,
    Destination,
}

impl PgEnum for ActorType {
    const TYPE_NAME: &'static str = "actor_type";
    const VARIANTS: &'static [Self] = &[Self::Source, Self::Destination];

    fn literal(self) -> &'static str {
        match self {
            ActorType::Source => "source",
            ActorType::Destination => "destination",
        }
    }
}

/// Kind of operation attached to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorType {
    Normalization,
    Dbt,
}

impl PgEnum for OperatorType {
    const TYPE_NAME: &'static str = "operator_type";
    const VARIANTS: &'static [Self] = &[Self::Normalization, Self::Dbt];

    fn literal(self) -> &'static str {
        match self {
            OperatorType::Normalization => "normalization",
            OperatorType::Dbt => "dbt",
        }
    }
}

/// Where a connection writes its destination namespace from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceDefinitionType {
    Source,
    Destination,
    CustomFormat,
}

impl PgEnum for NamespaceDefinitionType {
    const TYPE_NAME: &'static str = "namespace_definition_type";
    const VARIANTS: &'static [Self] = &[Self::Source, Self::Destination, Self::CustomFormat];

    fn literal(self) -> &'static str {
        match self {
            NamespaceDefinitionType::Source => "source",
            NamespaceDefinitionType::Destination => "destination",
            NamespaceDefinitionType::CustomFormat => "customformat",
        }
    }
}

/// Sync status of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusType {
    Active,
    Inactive,
    Deprecated,
}

impl PgEnum for StatusType {
    const TYPE_NAME: &'static str = "status_type";
    const VARIANTS: &'static [Self] = &[Self::Active, Self::Inactive, Self::Deprecated];

    fn literal(self) -> &'static str {
        match self {
            StatusType::Active => "active",
            StatusType::Inactive => "inactive",
            StatusType::Deprecated => "deprecated",
        }
    }
}

fn unrecognized(enum_name: &'static str, value: &str) -> MigrateError {
    MigrateError::UnrecognizedEnumValue {
        enum_name,
        value: value.to_string(),
    }
}

/// Map a source definition's `sourceType` literal to [`SourceType`].
pub fn source_type_from_config(value: &str) -> Result<SourceType> {
    match value {
        "api" => Ok(SourceType::Api),
        "file" => Ok(SourceType::File),
        "database" => Ok(SourceType::Database),
        "custom" => Ok(SourceType::Custom),
        _ => Err(unrecognized(SourceType::TYPE_NAME, value)),
    }
}

/// Map [`SourceType`] back to the config literal.
pub fn source_type_to_config(value: SourceType) -> &'static str {
    match value {
        SourceType::Api => "api",
        SourceType::File => "file",
        SourceType::Database => "database",
        SourceType::Custom => "custom",
    }
}

/// Map a sync's `namespaceDefinition` literal to [`NamespaceDefinitionType`].
pub fn namespace_definition_from_config(value: &str) -> Result<NamespaceDefinitionType> {
    match value {
        "source" => Ok(NamespaceDefinitionType::Source),
        "destination" => Ok(NamespaceDefinitionType::Destination),
        "customformat" => Ok(NamespaceDefinitionType::CustomFormat),
        _ => Err(unrecognized(NamespaceDefinitionType::TYPE_NAME, value)),
    }
}

/// Map [`NamespaceDefinitionType`] back to the config literal.
pub fn namespace_definition_to_config(value: NamespaceDefinitionType) -> &'static str {
    match value {
        NamespaceDefinitionType::Source => "source",
        NamespaceDefinitionType::Destination => "destination",
        NamespaceDefinitionType::CustomFormat => "customformat",
    }
}

/// Map a sync's `status` literal to [`StatusType`].
pub fn status_from_config(value: &str) -> Result<StatusType> {
    match value {
        "active" => Ok(StatusType::Active),
        "inactive" => Ok(StatusType::Inactive),
        "deprecated" => Ok(StatusType::Deprecated),
        _ => Err(unrecognized(StatusType::TYPE_NAME, value)),
    }
}

/// Map [`StatusType`] back to the config literal.
pub fn status_to_config(value: StatusType) -> &'static str {
    match value {
        StatusType::Active => "active",
        StatusType::Inactive => "inactive",
        StatusType::Deprecated => "deprecated",
    }
}

/// Map an operation's `operatorType` literal to [`OperatorType`].
pub fn operator_type_from_config(value: &str) -> Result<OperatorType> {
    match value {
        "normalization" => Ok(OperatorType::Normalization),
        "dbt" => Ok(OperatorType::Dbt),
        _ => Err(unrecognized(OperatorType::TYPE_NAME, value)),
    }
}

/// Map [`OperatorType`] back to the config literal.
pub fn operator_type_to_config(value: OperatorType) -> &'static str {
    match value {
        OperatorType::Normalization => "normalization",
        OperatorType::Dbt => "dbt",
    }
}
