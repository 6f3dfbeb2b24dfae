//! The per-entity data-access façade.
//!
//! Every public operation runs the same pipeline: pre-hook → logical to
//! physical translation → SQL through the builder/adapter → rows back to
//! logical entities → computed properties → post-hook.

use crate::Entity;
use crate::adapter::{FindOptions, StorageAdapter};
use crate::computed::ComputedPropertyEngine;
use crate::conditions::Condition;
use crate::error::{Result, RowmapError};
use crate::hooks::{HookContext, HookHandler, HookKind};
use crate::mapper::{EntityMapper, to_sql_value};
use crate::relations::RelationResolver;
use crate::row::Row;
use crate::schema::{EntityConfig, IdField, Relation};
use crate::tree::build_hierarchy;
use crate::value::SqlValue;
use chrono::{SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::sync::Arc;

/// CRUD semantics for one entity type over one adapter.
pub struct EntityDao<A: StorageAdapter + ?Sized> {
    config: Arc<EntityConfig>,
    adapter: Arc<A>,
    mapper: EntityMapper,
    computed: ComputedPropertyEngine,
    hooks: Option<Arc<dyn HookHandler>>,
}

impl<A: StorageAdapter + ?Sized> EntityDao<A> {
    /// Validates the config and builds the façade. Computed-property order
    /// and cycle detection happen here, once.
    pub fn new(config: EntityConfig, adapter: Arc<A>) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let mapper = EntityMapper::new(Arc::clone(&config));
        let computed = ComputedPropertyEngine::new(config.computed.clone());
        Ok(Self {
            config,
            adapter,
            mapper,
            computed,
            hooks: None,
        })
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn HookHandler>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn config(&self) -> &EntityConfig {
        &self.config
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn find_all(&self, options: FindOptions) -> Result<Vec<Entity>> {
        self.find_by(Entity::new(), options).await
    }

    /// Finds entities matching a logical equality filter (`null` → IS NULL,
    /// array → IN).
    pub async fn find_by(&self, filter: Entity, options: FindOptions) -> Result<Vec<Entity>> {
        let hooked = self
            .run_hook(
                HookKind::BeforeFindAll,
                "find_by",
                JsonValue::Object(filter.clone()),
            )
            .await?;
        // A pre-hook that returns something other than a filter object is a
        // no-op; the original filter must not silently widen to all rows.
        let filter = match hooked {
            JsonValue::Object(map) => map,
            _ => filter,
        };

        let conditions = self.filter_conditions(&filter)?;
        let rows = self
            .adapter
            .find_by(&self.config.table, conditions, options)
            .await?;
        let entities = self.materialize(&rows);

        let result = self
            .run_hook(
                HookKind::AfterFindAll,
                "find_by",
                JsonValue::Array(entities.iter().cloned().map(JsonValue::Object).collect()),
            )
            .await?;
        Ok(match result {
            JsonValue::Array(items) => items
                .into_iter()
                .filter_map(|v| v.as_object().cloned())
                .collect(),
            _ => entities,
        })
    }

    /// `find_by` with at most one result.
    pub async fn find_one(&self, filter: Entity, mut options: FindOptions) -> Result<Option<Entity>> {
        options.limit = Some(1);
        Ok(self.find_by(filter, options).await?.into_iter().next())
    }

    pub async fn find_by_id(&self, id: &JsonValue) -> Result<Option<Entity>> {
        let id = self
            .run_hook(HookKind::BeforeFindById, "find_by_id", id.clone())
            .await?;

        let conditions = self.id_conditions(&id)?;
        let row = self
            .adapter
            .find_one_by(&self.config.table, conditions, FindOptions::default())
            .await?;
        let entity = row.as_ref().map(|r| self.materialize_one(r));

        let result = self
            .run_hook(
                HookKind::AfterFindById,
                "find_by_id",
                entity.clone().map(JsonValue::Object).unwrap_or(JsonValue::Null),
            )
            .await?;
        Ok(match result {
            JsonValue::Object(map) => Some(map),
            JsonValue::Null => None,
            _ => entity,
        })
    }

    pub async fn count(&self, filter: Entity) -> Result<u64> {
        let conditions = self.filter_conditions(&filter)?;
        self.adapter.count(&self.config.table, conditions).await
    }

    pub async fn exists(&self, filter: Entity) -> Result<bool> {
        let conditions = self.filter_conditions(&filter)?;
        self.adapter.exists(&self.config.table, conditions).await
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Inserts one entity and returns its stored form (re-read when the
    /// primary key is generated by the database).
    pub async fn create(&self, entity: Entity) -> Result<Entity> {
        let mut entity = self
            .run_hook(HookKind::BeforeCreate, "create", JsonValue::Object(entity))
            .await?
            .as_object()
            .cloned()
            .ok_or_else(|| {
                RowmapError::Hook("beforeCreate hook did not return an entity".to_string())
            })?;

        if let Some(timestamps) = &self.config.timestamps {
            let now = now_rfc3339();
            if let Some(created) = &timestamps.created_at {
                entity.insert(created.clone(), JsonValue::String(now.clone()));
            }
            if let Some(updated) = &timestamps.updated_at {
                entity.insert(updated.clone(), JsonValue::String(now));
            }
        }

        let mut values = self.mapper.to_physical(&entity);
        // A generated key must not be bound as NULL.
        if let Some(auto) = self.config.auto_increment_column() {
            values.retain(|(column, value)| column != &auto.physical || !value.is_null());
        }
        let result = self.adapter.insert(&self.config.table, values).await?;

        let stored = match (self.config.auto_increment_column(), result.last_insert_rowid) {
            (Some(auto), Some(rowid)) => {
                let row = self
                    .adapter
                    .find_by_id(&self.config.table, &auto.physical, SqlValue::Integer(rowid))
                    .await?;
                row.map(|r| self.materialize_one(&r))
            }
            _ => {
                let conditions = self.entity_id_conditions(&entity)?;
                match conditions {
                    Some(conditions) => self
                        .adapter
                        .find_one_by(&self.config.table, conditions, FindOptions::default())
                        .await?
                        .map(|r| self.materialize_one(&r)),
                    None => None,
                }
            }
        };
        let mut created = stored.unwrap_or_else(|| {
            let mut fallback = entity;
            self.computed.apply(&mut fallback, &HashSet::new());
            fallback
        });

        let result = self
            .run_hook(
                HookKind::AfterCreate,
                "create",
                JsonValue::Object(created.clone()),
            )
            .await?;
        if let JsonValue::Object(map) = result {
            created = map;
        }
        Ok(created)
    }

    /// Applies a partial update and returns the stored entity, or `None`
    /// when no row matched the id.
    pub async fn update(&self, id: &JsonValue, changes: Entity) -> Result<Option<Entity>> {
        let mut changes = self
            .run_hook(HookKind::BeforeUpdate, "update", JsonValue::Object(changes))
            .await?
            .as_object()
            .cloned()
            .ok_or_else(|| {
                RowmapError::Hook("beforeUpdate hook did not return a change set".to_string())
            })?;

        if let Some(updated) = self
            .config
            .timestamps
            .as_ref()
            .and_then(|t| t.updated_at.as_ref())
        {
            changes.insert(updated.clone(), JsonValue::String(now_rfc3339()));
        }

        let pairs = self.mapper.to_physical(&changes);
        if pairs.is_empty() {
            return Err(RowmapError::Configuration(format!(
                "update of '{}' mapped no configured fields",
                self.config.name
            )));
        }

        let affected = self
            .adapter
            .update_by(&self.config.table, pairs, self.id_conditions(id)?)
            .await?;
        if affected == 0 {
            return Ok(None);
        }

        let row = self
            .adapter
            .find_one_by(&self.config.table, self.id_conditions(id)?, FindOptions::default())
            .await?;
        let mut updated = row.map(|r| self.materialize_one(&r));

        let result = self
            .run_hook(
                HookKind::AfterUpdate,
                "update",
                updated.clone().map(JsonValue::Object).unwrap_or(JsonValue::Null),
            )
            .await?;
        if let JsonValue::Object(map) = result {
            updated = Some(map);
        }
        Ok(updated)
    }

    /// Deletes by id. With a configured soft delete this is rewritten into
    /// an update of the sentinel column; the row stays in place.
    pub async fn delete(&self, id: &JsonValue) -> Result<bool> {
        let id = self
            .run_hook(HookKind::BeforeDelete, "delete", id.clone())
            .await?;
        let conditions = self.id_conditions(&id)?;

        let affected = match &self.config.soft_delete {
            Some(soft_delete) => {
                let column = self
                    .config
                    .find_column(&soft_delete.column)
                    .ok_or_else(|| {
                        RowmapError::Configuration(format!(
                            "entity '{}': soft-delete column '{}' is not configured",
                            self.config.name, soft_delete.column
                        ))
                    })?;
                let sentinel = to_sql_value(&soft_delete.deleted_value, column.column_type);
                self.adapter
                    .update_by(
                        &self.config.table,
                        vec![(column.physical.clone(), sentinel)],
                        conditions,
                    )
                    .await?
            }
            None => self.adapter.delete_by(&self.config.table, conditions).await?,
        };

        let deleted = affected > 0;
        self.run_hook(HookKind::AfterDelete, "delete", JsonValue::Bool(deleted))
            .await?;
        Ok(deleted)
    }

    // ------------------------------------------------------------------
    // Relations
    // ------------------------------------------------------------------

    /// Adds a many-to-many membership through the relation's junction table.
    pub async fn link(
        &self,
        relation_name: &str,
        source_id: SqlValue,
        target_id: SqlValue,
    ) -> Result<u64> {
        let relation = self.relation(relation_name)?;
        RelationResolver::link(&*self.adapter, relation, source_id, target_id).await
    }

    /// Removes a many-to-many membership.
    pub async fn unlink(
        &self,
        relation_name: &str,
        source_id: SqlValue,
        target_id: SqlValue,
    ) -> Result<u64> {
        let relation = self.relation(relation_name)?;
        RelationResolver::unlink(&*self.adapter, relation, source_id, target_id).await
    }

    /// Clears every membership of `source_id` for the relation.
    pub async fn unlink_all(&self, relation_name: &str, source_id: SqlValue) -> Result<u64> {
        let relation = self.relation(relation_name)?;
        RelationResolver::unlink_all(&*self.adapter, relation, source_id).await
    }

    /// Assembles a parent/children tree from flat entities of this type.
    /// `parent_field` and `children_field` are logical names.
    pub fn assemble_tree(
        &self,
        entities: Vec<Entity>,
        parent_field: &str,
        children_field: &str,
    ) -> Result<Vec<Entity>> {
        let id_field = match &self.config.id_field {
            IdField::Single(field) => field.as_str(),
            IdField::Composite(_) => {
                return Err(RowmapError::Configuration(format!(
                    "entity '{}': hierarchies require a single-column id",
                    self.config.name
                )));
            }
        };
        Ok(build_hierarchy(entities, id_field, parent_field, children_field))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn relation(&self, name: &str) -> Result<&Relation> {
        self.config
            .relations
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| {
                RowmapError::Configuration(format!(
                    "entity '{}' has no relation named '{name}'",
                    self.config.name
                ))
            })
    }

    fn materialize(&self, rows: &[Row]) -> Vec<Entity> {
        let mut entities = self.mapper.to_entities(rows);
        self.computed.apply_batch(&mut entities, &HashSet::new());
        entities
    }

    fn materialize_one(&self, row: &Row) -> Entity {
        let mut entity = self.mapper.to_entity(row);
        self.computed.apply(&mut entity, &HashSet::new());
        entity
    }

    /// Logical equality filter → physical conditions. Unknown logical names
    /// fail fast instead of leaking into SQL.
    fn filter_conditions(&self, filter: &Entity) -> Result<Vec<Condition>> {
        let mut conditions = Vec::with_capacity(filter.len());
        for (logical, value) in filter {
            let physical = self.mapper.logical_to_physical(logical).ok_or_else(|| {
                RowmapError::Configuration(format!(
                    "entity '{}': filter references unknown field '{logical}'",
                    self.config.name
                ))
            })?;
            conditions.push(Condition::from_json(physical, value));
        }
        Ok(conditions)
    }

    /// Conditions selecting exactly the row(s) with the given id value.
    /// Composite ids take an array with one element per id field.
    fn id_conditions(&self, id: &JsonValue) -> Result<Vec<Condition>> {
        match &self.config.id_field {
            IdField::Single(field) => {
                let physical = self.physical_of(field)?;
                Ok(vec![Condition::from_json(physical, id)])
            }
            IdField::Composite(fields) => {
                let parts = id.as_array().ok_or_else(|| {
                    RowmapError::Configuration(format!(
                        "entity '{}': composite id expects an array of {} values",
                        self.config.name,
                        fields.len()
                    ))
                })?;
                if parts.len() != fields.len() {
                    return Err(RowmapError::Configuration(format!(
                        "entity '{}': composite id expects {} values, got {}",
                        self.config.name,
                        fields.len(),
                        parts.len()
                    )));
                }
                fields
                    .iter()
                    .zip(parts)
                    .map(|(field, value)| {
                        Ok(Condition::from_json(self.physical_of(field)?, value))
                    })
                    .collect()
            }
        }
    }

    /// Id conditions from the entity's own fields, when they are all set.
    fn entity_id_conditions(&self, entity: &Entity) -> Result<Option<Vec<Condition>>> {
        let fields = self.config.id_field.fields();
        let mut conditions = Vec::with_capacity(fields.len());
        for field in fields {
            match entity.get(field) {
                Some(value) if !value.is_null() => {
                    conditions.push(Condition::from_json(self.physical_of(field)?, value));
                }
                _ => return Ok(None),
            }
        }
        Ok(Some(conditions))
    }

    fn physical_of(&self, logical: &str) -> Result<String> {
        self.mapper
            .logical_to_physical(logical)
            .map(str::to_string)
            .ok_or_else(|| {
                RowmapError::Configuration(format!(
                    "entity '{}': unknown logical column '{logical}'",
                    self.config.name
                ))
            })
    }

    /// Hooks are awaited in sequence; without a handler the payload passes
    /// through untouched.
    async fn run_hook(
        &self,
        kind: HookKind,
        operation: &'static str,
        payload: JsonValue,
    ) -> Result<JsonValue> {
        match &self.hooks {
            Some(handler) => {
                let context = HookContext {
                    entity: self.config.name.clone(),
                    operation,
                };
                handler.execute_hook(kind, payload, &context).await
            }
            None => Ok(payload),
        }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
