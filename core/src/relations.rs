//! Turning declared relations into joins and junction-table mutations.

use crate::adapter::StorageAdapter;
use crate::builder::{JoinKind, QueryBuilder};
use crate::conditions::Condition;
use crate::error::{Result, RowmapError};
use crate::schema::{Relation, RelationKind};
use crate::value::SqlValue;

/// One relation to resolve into a join, possibly carrying nested relations
/// that hang off the joined alias.
#[derive(Debug, Clone, Default)]
pub struct JoinRelation {
    pub name: String,
    /// Target table to join.
    pub table: String,
    /// Join alias; defaults to the relation name.
    pub alias: Option<String>,
    /// Explicit join kind. `None` means `LEFT`; `INNER` only when asked for.
    pub kind: Option<JoinKind>,
    /// Explicit ON clause, `?`-positional.
    pub join_condition: Option<String>,
    pub join_params: Vec<SqlValue>,
    /// Physical column on the source side, for the derived ON clause.
    pub source_field: Option<String>,
    /// Physical column on the target side, for the derived ON clause.
    pub target_field: Option<String>,
    /// Relations joined off this relation's alias.
    pub nested: Vec<JoinRelation>,
}

impl JoinRelation {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn on_columns(
        mut self,
        source_field: impl Into<String>,
        target_field: impl Into<String>,
    ) -> Self {
        self.source_field = Some(source_field.into());
        self.target_field = Some(target_field.into());
        self
    }

    pub fn on_condition(mut self, condition: impl Into<String>, params: Vec<SqlValue>) -> Self {
        self.join_condition = Some(condition.into());
        self.join_params = params;
        self
    }

    pub fn inner(mut self) -> Self {
        self.kind = Some(JoinKind::Inner);
        self
    }

    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn nested(mut self, relation: JoinRelation) -> Self {
        self.nested.push(relation);
        self
    }
}

/// Resolves declared relations into join clauses and drives the junction
/// write path for many-to-many memberships.
pub struct RelationResolver;

impl RelationResolver {
    /// Adds one join per relation to `builder`, recursing into nested
    /// relations with the just-joined alias as the new source alias.
    ///
    /// A relation with neither an explicit `join_condition` nor both
    /// `source_field`/`target_field` is a configuration error.
    pub fn apply_relations<'a>(
        mut builder: QueryBuilder<'a>,
        source_alias: &str,
        relations: &[JoinRelation],
    ) -> Result<QueryBuilder<'a>> {
        for relation in relations {
            let alias = relation.alias.clone().unwrap_or_else(|| relation.name.clone());
            let kind = relation.kind.unwrap_or(JoinKind::Left);

            let (on, params) = match (&relation.join_condition, &relation.source_field, &relation.target_field) {
                (Some(condition), _, _) => (condition.clone(), relation.join_params.clone()),
                (None, Some(source), Some(target)) => (
                    format!("{source_alias}.{source} = {alias}.{target}"),
                    Vec::new(),
                ),
                _ => {
                    return Err(RowmapError::Configuration(format!(
                        "relation '{}' has neither a join condition nor a source/target column pair",
                        relation.name
                    )));
                }
            };

            builder = builder.join(kind, relation.table.clone(), Some(&alias), on, params);

            if !relation.nested.is_empty() {
                builder = Self::apply_relations(builder, &alias, &relation.nested)?;
            }
        }
        Ok(builder)
    }

    /// Adds a `(source, target)` membership row to the junction table.
    pub async fn link<A: StorageAdapter + ?Sized>(
        adapter: &A,
        relation: &Relation,
        source_id: SqlValue,
        target_id: SqlValue,
    ) -> Result<u64> {
        let (table, source_column, target_column) = Self::junction(relation)?;
        let result = adapter
            .insert(
                table,
                vec![
                    (source_column.to_string(), source_id),
                    (target_column.to_string(), target_id),
                ],
            )
            .await?;
        Ok(result.changes)
    }

    /// Removes a `(source, target)` membership row. Returns rows removed.
    pub async fn unlink<A: StorageAdapter + ?Sized>(
        adapter: &A,
        relation: &Relation,
        source_id: SqlValue,
        target_id: SqlValue,
    ) -> Result<u64> {
        let (table, source_column, target_column) = Self::junction(relation)?;
        adapter
            .delete_by(
                table,
                vec![
                    Condition::eq(source_column, source_id),
                    Condition::eq(target_column, target_id),
                ],
            )
            .await
    }

    /// Clears every membership row for one source entity.
    pub async fn unlink_all<A: StorageAdapter + ?Sized>(
        adapter: &A,
        relation: &Relation,
        source_id: SqlValue,
    ) -> Result<u64> {
        let (table, source_column, _) = Self::junction(relation)?;
        adapter
            .delete_by(table, vec![Condition::eq(source_column, source_id)])
            .await
    }

    fn junction(relation: &Relation) -> Result<(&str, &str, &str)> {
        if relation.kind != RelationKind::ManyToMany {
            return Err(RowmapError::Configuration(format!(
                "relation '{}' is not manyToMany; junction mutations do not apply",
                relation.name
            )));
        }
        match (
            relation.junction_table.as_deref(),
            relation.junction_source_column.as_deref(),
            relation.junction_target_column.as_deref(),
        ) {
            (Some(table), Some(source), Some(target)) => Ok((table, source, target)),
            _ => Err(RowmapError::Configuration(format!(
                "relation '{}' is missing its junction mapping",
                relation.name
            ))),
        }
    }
}
