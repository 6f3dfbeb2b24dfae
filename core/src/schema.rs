//! Runtime entity configuration.
//!
//! Configs arrive fully formed from an external loader; this module only
//! defines the shapes and the fail-fast validation of their invariants.

use crate::computed::ComputedProperty;
use crate::error::{Result, RowmapError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Column value classes used for coercion between rows and entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Boolean,
    Integer,
    Real,
    Text,
    Date,
    DateTime,
    Timestamp,
    Json,
    Blob,
}

/// One mapped column: the application-facing logical name and the physical
/// database column it translates to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub logical: String,
    pub physical: String,
    #[serde(default)]
    pub column_type: Option<ColumnType>,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
}

impl Column {
    pub fn new(logical: impl Into<String>, physical: impl Into<String>) -> Self {
        Self {
            logical: logical.into(),
            physical: physical.into(),
            column_type: None,
            nullable: false,
            primary_key: false,
            auto_increment: false,
        }
    }

    pub fn with_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = Some(column_type);
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.primary_key = true;
        self.auto_increment = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Association flavors between two entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationKind {
    ManyToOne,
    OneToMany,
    ManyToMany,
    OneToOne,
}

/// A declared association between two entities.
///
/// For `ManyToMany`, the junction table is an independent table keyed by the
/// two foreign columns, not individually primary-keyed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub name: String,
    pub kind: RelationKind,
    pub source_entity: String,
    pub target_entity: String,
    /// Logical column on the source entity.
    pub source_column: String,
    /// Logical column on the target entity.
    pub target_column: String,
    #[serde(default)]
    pub junction_table: Option<String>,
    #[serde(default)]
    pub junction_source_column: Option<String>,
    #[serde(default)]
    pub junction_target_column: Option<String>,
    #[serde(default)]
    pub is_owner: bool,
}

/// Configured timestamp stamping for create/update paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timestamps {
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Soft-delete configuration: the logical column and the sentinel written
/// into it instead of removing the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftDelete {
    pub column: String,
    pub deleted_value: serde_json::Value,
}

/// The primary key of an entity, by logical name. May be composite.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdField {
    Single(String),
    Composite(Vec<String>),
}

impl IdField {
    pub fn fields(&self) -> Vec<&str> {
        match self {
            IdField::Single(f) => vec![f.as_str()],
            IdField::Composite(fs) => fs.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, IdField::Composite(fs) if fs.len() > 1)
    }
}

impl From<&str> for IdField {
    fn from(value: &str) -> Self {
        IdField::Single(value.to_string())
    }
}

/// Everything the engine knows about one entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    pub table: String,
    pub id_field: IdField,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub relations: Vec<Relation>,
    /// Computed properties are attached in code, not deserialized.
    #[serde(skip)]
    pub computed: Vec<ComputedProperty>,
    #[serde(default)]
    pub timestamps: Option<Timestamps>,
    #[serde(default)]
    pub soft_delete: Option<SoftDelete>,
}

impl EntityConfig {
    pub fn new(name: impl Into<String>, table: impl Into<String>, id_field: impl Into<IdField>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            id_field: id_field.into(),
            columns: Vec::new(),
            relations: Vec::new(),
            computed: Vec::new(),
            timestamps: None,
            soft_delete: None,
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn computed_property(mut self, property: ComputedProperty) -> Self {
        self.computed.push(property);
        self
    }

    pub fn with_timestamps(mut self, timestamps: Timestamps) -> Self {
        self.timestamps = Some(timestamps);
        self
    }

    pub fn with_soft_delete(mut self, soft_delete: SoftDelete) -> Self {
        self.soft_delete = Some(soft_delete);
        self
    }

    pub fn find_column(&self, logical: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.logical == logical)
    }

    /// The single auto-incrementing primary key column, when there is one.
    pub fn auto_increment_column(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.auto_increment)
    }

    /// Fails fast when a logical name referenced anywhere in the config does
    /// not exist in `columns`, or when two columns share a logical name.
    pub fn validate(&self) -> Result<()> {
        let mut logical = HashSet::new();
        for column in &self.columns {
            if !logical.insert(column.logical.as_str()) {
                return Err(RowmapError::Configuration(format!(
                    "entity '{}': duplicate logical column '{}'",
                    self.name, column.logical
                )));
            }
        }

        for field in self.id_field.fields() {
            self.require_column(field, "id field")?;
        }

        for relation in &self.relations {
            if relation.source_entity == self.name {
                self.require_column(&relation.source_column, "relation source")?;
            }
            if relation.kind == RelationKind::ManyToMany
                && (relation.junction_table.is_none()
                    || relation.junction_source_column.is_none()
                    || relation.junction_target_column.is_none())
            {
                return Err(RowmapError::Configuration(format!(
                    "entity '{}': manyToMany relation '{}' is missing its junction mapping",
                    self.name, relation.name
                )));
            }
        }

        let computed_names: HashSet<&str> =
            self.computed.iter().map(|p| p.name.as_str()).collect();
        for property in &self.computed {
            for dep in &property.dependencies {
                if !logical.contains(dep.as_str()) && !computed_names.contains(dep.as_str()) {
                    return Err(RowmapError::Configuration(format!(
                        "entity '{}': computed property '{}' depends on unknown field '{}'",
                        self.name, property.name, dep
                    )));
                }
            }
        }

        if let Some(timestamps) = &self.timestamps {
            if let Some(created) = &timestamps.created_at {
                self.require_column(created, "createdAt timestamp")?;
            }
            if let Some(updated) = &timestamps.updated_at {
                self.require_column(updated, "updatedAt timestamp")?;
            }
        }

        if let Some(soft_delete) = &self.soft_delete {
            self.require_column(&soft_delete.column, "soft-delete")?;
        }

        Ok(())
    }

    fn require_column(&self, logical: &str, role: &str) -> Result<()> {
        if self.find_column(logical).is_none() {
            return Err(RowmapError::Configuration(format!(
                "entity '{}': {role} references unknown logical column '{logical}'",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EntityConfig {
        EntityConfig::new("user", "users", "id")
            .column(Column::new("id", "id").with_type(ColumnType::Integer).auto_increment())
            .column(Column::new("name", "full_name"))
    }

    #[test]
    fn valid_config_passes() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn unknown_id_field_fails() {
        let mut cfg = config();
        cfg.id_field = "uuid".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn duplicate_logical_name_fails() {
        let cfg = config().column(Column::new("name", "other"));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn many_to_many_requires_junction_mapping() {
        let cfg = config().relation(Relation {
            name: "groups".into(),
            kind: RelationKind::ManyToMany,
            source_entity: "user".into(),
            target_entity: "group".into(),
            source_column: "id".into(),
            target_column: "id".into(),
            junction_table: None,
            junction_source_column: None,
            junction_target_column: None,
            is_owner: true,
        });
        assert!(cfg.validate().is_err());
    }
}
