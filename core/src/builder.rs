//! The SQL query builder.
//!
//! A builder is created per logical operation (usually through
//! [`StorageAdapter::create_query_builder`]), mutated through chained calls,
//! rendered once, and discarded. Parameter order in [`QueryBuilder::params`]
//! always matches placeholder order in [`QueryBuilder::sql`]; adapters bind
//! positionally, so this is the invariant everything else leans on.

use crate::adapter::StorageAdapter;
use crate::conditions::Condition;
use crate::dialect::{Dialect, count_placeholders};
use crate::error::{Result, RowmapError};
use crate::row::Row;
use crate::value::SqlValue;
use smallvec::SmallVec;

/// Sort direction for `ORDER BY` clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    #[default]
    Asc,
    Desc,
}

impl OrderBy {
    fn sql(&self) -> &'static str {
        match self {
            OrderBy::Asc => "ASC",
            OrderBy::Desc => "DESC",
        }
    }
}

/// Join flavors the builder can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKind {
    Inner,
    #[default]
    Left,
    Right,
    Cross,
}

impl JoinKind {
    fn sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

/// Boolean connective between accumulated WHERE clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connective {
    And,
    Or,
}

#[derive(Debug, Clone)]
struct WhereClause {
    connective: Connective,
    clause: String,
    params: Vec<SqlValue>,
}

#[derive(Debug, Clone)]
struct JoinClause {
    kind: JoinKind,
    table: String,
    alias: Option<String>,
    on: String,
    params: Vec<SqlValue>,
}

/// Accumulates a structured query and renders it to dialect SQL text plus an
/// ordered parameter list.
///
/// ```
/// use rowmap_core::builder::{OrderBy, QueryBuilder};
/// use rowmap_core::Dialect;
///
/// let qb = QueryBuilder::new(Dialect::Sqlite)
///     .select(["id", "name"])
///     .from("users", None)
///     .r#where("role = ?", vec!["admin".into()])
///     .order_by("name", OrderBy::Asc)
///     .limit(10);
///
/// assert_eq!(
///     qb.sql(),
///     "SELECT id, name FROM users WHERE (role = ?) ORDER BY name ASC LIMIT 10"
/// );
/// assert_eq!(qb.params().len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct QueryBuilder<'a> {
    dialect: Option<Dialect>,
    adapter: Option<&'a dyn StorageAdapter>,
    select: Vec<String>,
    from: Option<(String, Option<String>)>,
    joins: Vec<JoinClause>,
    wheres: SmallVec<[WhereClause; 4]>,
    group_by: Vec<String>,
    having: Option<(String, Vec<SqlValue>)>,
    order_by: Vec<(String, OrderBy)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl std::fmt::Debug for QueryBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("sql", &self.render_positional())
            .field("params", &self.collect_params())
            .finish()
    }
}

impl<'a> QueryBuilder<'a> {
    /// A detached builder for the given placeholder dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect: Some(dialect),
            ..Self::default()
        }
    }

    /// A builder owned by `adapter`; `execute`/`get_one` delegate to it.
    pub fn for_adapter(adapter: &'a dyn StorageAdapter) -> Self {
        Self {
            dialect: Some(adapter.dialect()),
            adapter: Some(adapter),
            ..Self::default()
        }
    }

    pub fn select<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.select.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn from(mut self, table: impl Into<String>, alias: Option<&str>) -> Self {
        self.from = Some((table.into(), alias.map(str::to_string)));
        self
    }

    /// Appends a raw WHERE clause with its positional parameters.
    ///
    /// The first clause's connective is ignored, so `r#where`, `and_where`
    /// and `or_where` are interchangeable for the opening predicate.
    pub fn r#where(self, clause: impl Into<String>, params: Vec<SqlValue>) -> Self {
        self.push_where(Connective::And, clause.into(), params)
    }

    pub fn and_where(self, clause: impl Into<String>, params: Vec<SqlValue>) -> Self {
        self.push_where(Connective::And, clause.into(), params)
    }

    pub fn or_where(self, clause: impl Into<String>, params: Vec<SqlValue>) -> Self {
        self.push_where(Connective::Or, clause.into(), params)
    }

    /// Appends a structured condition (AND-connected).
    pub fn where_condition(self, condition: &Condition) -> Self {
        let (clause, params) = condition.render();
        self.push_where(Connective::And, clause, params)
    }

    pub fn or_where_condition(self, condition: &Condition) -> Self {
        let (clause, params) = condition.render();
        self.push_where(Connective::Or, clause, params)
    }

    /// Appends every condition in `conditions`, AND-connected.
    pub fn where_all(mut self, conditions: &[Condition]) -> Self {
        for condition in conditions {
            self = self.where_condition(condition);
        }
        self
    }

    fn push_where(
        mut self,
        connective: Connective,
        clause: String,
        params: Vec<SqlValue>,
    ) -> Self {
        self.wheres.push(WhereClause {
            connective,
            clause,
            params,
        });
        self
    }

    pub fn join(
        mut self,
        kind: JoinKind,
        table: impl Into<String>,
        alias: Option<&str>,
        on: impl Into<String>,
        params: Vec<SqlValue>,
    ) -> Self {
        self.joins.push(JoinClause {
            kind,
            table: table.into(),
            alias: alias.map(str::to_string),
            on: on.into(),
            params,
        });
        self
    }

    pub fn group_by<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.group_by.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn having(mut self, clause: impl Into<String>, params: Vec<SqlValue>) -> Self {
        self.having = Some((clause.into(), params));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: OrderBy) -> Self {
        self.order_by.push((field.into(), direction));
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect.unwrap_or(Dialect::Sqlite)
    }

    /// Renders the query in this builder's dialect without executing it.
    pub fn sql(&self) -> String {
        self.dialect().finalize(&self.render_positional())
    }

    /// The ordered parameter list matching [`QueryBuilder::sql`].
    pub fn params(&self) -> Vec<SqlValue> {
        self.collect_params()
    }

    /// Renders and executes through the owning adapter.
    pub async fn execute(self) -> Result<Vec<Row>> {
        let adapter = self.owning_adapter()?;
        let (sql, params) = self.render_checked()?;
        adapter.query(&sql, params).await
    }

    /// Renders with a forced `LIMIT 1` and returns at most one row.
    pub async fn get_one(mut self) -> Result<Option<Row>> {
        self.limit = Some(1);
        let adapter = self.owning_adapter()?;
        let (sql, params) = self.render_checked()?;
        adapter.query_single(&sql, params).await
    }

    fn owning_adapter(&self) -> Result<&'a dyn StorageAdapter> {
        self.adapter.ok_or_else(|| {
            RowmapError::Configuration(
                "query builder is not attached to an adapter; use sql()/params()".to_string(),
            )
        })
    }

    /// Renders and asserts the placeholder/parameter count invariant.
    ///
    /// A mismatch is a programming error in a dynamic SQL fragment, caught
    /// before the statement ever reaches the driver.
    pub fn render_checked(&self) -> Result<(String, Vec<SqlValue>)> {
        let positional = self.render_positional();
        let params = self.collect_params();
        let expected = count_placeholders(&positional);
        if expected != params.len() {
            return Err(RowmapError::PlaceholderMismatch {
                expected,
                actual: params.len(),
            });
        }
        Ok((self.dialect().finalize(&positional), params))
    }

    /// Renders `?`-positional SQL from the accumulated request.
    fn render_positional(&self) -> String {
        let mut sql = String::with_capacity(64);
        sql.push_str("SELECT ");
        if self.select.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.select.join(", "));
        }

        if let Some((table, alias)) = &self.from {
            sql.push_str(" FROM ");
            sql.push_str(table);
            if let Some(alias) = alias {
                sql.push_str(" AS ");
                sql.push_str(alias);
            }
        }

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join.kind.sql());
            sql.push(' ');
            sql.push_str(&join.table);
            if let Some(alias) = &join.alias {
                sql.push_str(" AS ");
                sql.push_str(alias);
            }
            sql.push_str(" ON ");
            sql.push_str(&join.on);
        }

        for (i, clause) in self.wheres.iter().enumerate() {
            if i == 0 {
                sql.push_str(" WHERE ");
            } else {
                sql.push_str(match clause.connective {
                    Connective::And => " AND ",
                    Connective::Or => " OR ",
                });
            }
            sql.push('(');
            sql.push_str(&clause.clause);
            sql.push(')');
        }

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        if let Some((clause, _)) = &self.having {
            sql.push_str(" HAVING ");
            sql.push_str(clause);
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let parts: Vec<String> = self
                .order_by
                .iter()
                .map(|(field, dir)| format!("{field} {}", dir.sql()))
                .collect();
            sql.push_str(&parts.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ");
            sql.push_str(&limit.to_string());
        }
        if let Some(offset) = self.offset {
            sql.push_str(" OFFSET ");
            sql.push_str(&offset.to_string());
        }

        sql
    }

    /// Parameters in clause order: joins, then wheres, then having.
    fn collect_params(&self) -> Vec<SqlValue> {
        let mut params = Vec::new();
        for join in &self.joins {
            params.extend(join.params.iter().cloned());
        }
        for clause in &self.wheres {
            params.extend(clause.params.iter().cloned());
        }
        if let Some((_, having_params)) = &self.having {
            params.extend(having_params.iter().cloned());
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::Condition;

    #[test]
    fn renders_clauses_in_statement_order() {
        let qb = QueryBuilder::new(Dialect::Sqlite)
            .select(["u.id", "COUNT(o.id) AS orders"])
            .from("users", Some("u"))
            .join(
                JoinKind::Left,
                "orders",
                Some("o"),
                "o.user_id = u.id AND o.status = ?",
                vec!["open".into()],
            )
            .r#where("u.active = ?", vec![1.into()])
            .group_by(["u.id"])
            .having("COUNT(o.id) > ?", vec![5.into()])
            .order_by("orders", OrderBy::Desc)
            .limit(20)
            .offset(40);

        assert_eq!(
            qb.sql(),
            "SELECT u.id, COUNT(o.id) AS orders FROM users AS u \
             LEFT JOIN orders AS o ON o.user_id = u.id AND o.status = ? \
             WHERE (u.active = ?) GROUP BY u.id HAVING COUNT(o.id) > ? \
             ORDER BY orders DESC LIMIT 20 OFFSET 40"
        );
        // Parameter order mirrors placeholder order: join, where, having.
        assert_eq!(
            qb.params(),
            vec!["open".into(), 1.into(), 5.into()]
        );
    }

    #[test]
    fn first_connective_is_ignored() {
        let a = QueryBuilder::new(Dialect::Sqlite)
            .from("t", None)
            .or_where("a = ?", vec![1.into()])
            .sql();
        let b = QueryBuilder::new(Dialect::Sqlite)
            .from("t", None)
            .r#where("a = ?", vec![1.into()])
            .sql();
        assert_eq!(a, b);
    }

    #[test]
    fn or_where_uses_or_connective() {
        let qb = QueryBuilder::new(Dialect::Sqlite)
            .from("t", None)
            .r#where("a = ?", vec![1.into()])
            .or_where("b = ?", vec![2.into()]);
        assert_eq!(qb.sql(), "SELECT * FROM t WHERE (a = ?) OR (b = ?)");
    }

    #[test]
    fn postgres_dialect_renumbers_placeholders() {
        let qb = QueryBuilder::new(Dialect::Postgres)
            .from("t", None)
            .r#where("a = ?", vec![1.into()])
            .and_where("b = ?", vec![2.into()]);
        assert_eq!(qb.sql(), "SELECT * FROM t WHERE (a = $1) AND (b = $2)");
    }

    #[test]
    fn empty_in_condition_renders_always_false() {
        let qb = QueryBuilder::new(Dialect::Sqlite)
            .from("t", None)
            .where_condition(&Condition::in_list("id", Vec::new()));
        assert_eq!(qb.sql(), "SELECT * FROM t WHERE (0 = 1)");
        assert!(qb.params().is_empty());
    }

    #[test]
    fn render_checked_rejects_parameter_mismatch() {
        let qb = QueryBuilder::new(Dialect::Sqlite)
            .from("t", None)
            .r#where("a = ? AND b = ?", vec![1.into()]);
        let err = qb.render_checked().expect_err("must not render");
        assert!(matches!(
            err,
            crate::error::RowmapError::PlaceholderMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }
}
