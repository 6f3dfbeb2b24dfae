//! The storage-adapter contract.
//!
//! Dialects implement the primitive surface (`connect`, `query`, `execute`,
//! transaction verbs); every generic operation here is derived once from
//! those primitives and shared by all dialects.

use crate::builder::{JoinKind, OrderBy, QueryBuilder};
use crate::conditions::Condition;
use crate::dialect::{Dialect, count_placeholders};
use crate::error::{Result, RowmapError};
use crate::relations::{JoinRelation, RelationResolver};
use crate::row::{ExecuteResult, Row};
use crate::value::SqlValue;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::error;

/// How the outermost transaction acquires its locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionBehavior {
    /// Acquire locks lazily, on first use.
    #[default]
    Deferred,
    /// Acquire a write lock immediately.
    Immediate,
    /// Acquire an exclusive lock immediately.
    Exclusive,
}

/// Units understood by the dialect date expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

/// Dialect-specific SQL expressions over dates.
///
/// Every method returns an SQL fragment, never a computed value; the
/// fragments are meant to be embedded in select lists or conditions.
pub trait DateFunctions: Send + Sync {
    /// The current UTC timestamp expression.
    fn now(&self) -> String;
    /// Difference `end - start` in `unit`.
    fn diff(&self, unit: DateUnit, start: &str, end: &str) -> String;
    /// `expr` shifted by `amount` units (negative shifts backwards).
    fn add(&self, expr: &str, amount: i64, unit: DateUnit) -> String;
    /// `expr` formatted with the dialect's format string syntax.
    fn format(&self, expr: &str, format: &str) -> String;
    /// A boolean expression testing that `expr` parses as a date.
    fn validate(&self, expr: &str) -> String;
}

/// Informational snapshot of the underlying database. Not part of the
/// transactional contract.
#[derive(Debug, Clone, Default)]
pub struct DatabaseInfo {
    pub engine: String,
    pub tables: Vec<String>,
    pub table_count: usize,
    /// Dialect-specific settings such as journal mode or cache size.
    pub settings: BTreeMap<String, String>,
}

/// An explicit join for `find_with_join`, independent of declared relations.
#[derive(Debug, Clone)]
pub struct JoinSpec {
    pub kind: JoinKind,
    pub table: String,
    pub alias: Option<String>,
    pub on: String,
    pub params: Vec<SqlValue>,
}

/// Options shared by the generic read operations.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Select expressions; empty means `*`.
    pub fields: Vec<String>,
    /// Declared relations to resolve into joins.
    pub relations: Vec<JoinRelation>,
    pub order_by: Vec<(String, OrderBy)>,
    pub group_by: Vec<String>,
    pub having: Option<(String, Vec<SqlValue>)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl FindOptions {
    fn apply<'a>(
        &self,
        mut builder: QueryBuilder<'a>,
        source_alias: &str,
    ) -> Result<QueryBuilder<'a>> {
        if !self.fields.is_empty() {
            builder = builder.select(self.fields.iter().cloned());
        }
        if !self.relations.is_empty() {
            builder = RelationResolver::apply_relations(builder, source_alias, &self.relations)?;
        }
        for (field, direction) in &self.order_by {
            builder = builder.order_by(field.clone(), *direction);
        }
        if !self.group_by.is_empty() {
            builder = builder.group_by(self.group_by.iter().cloned());
        }
        if let Some((clause, params)) = &self.having {
            builder = builder.having(clause.clone(), params.clone());
        }
        if let Some(limit) = self.limit {
            builder = builder.limit(limit);
        }
        if let Some(offset) = self.offset {
            builder = builder.offset(offset);
        }
        Ok(builder)
    }
}

/// Aggregate functions accepted by [`StorageAdapter::aggregate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    /// Validates a requested function name. Anything outside the closed set
    /// is a configuration error, caught before any SQL is built.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "COUNT" => Ok(AggregateFunction::Count),
            "SUM" => Ok(AggregateFunction::Sum),
            "AVG" => Ok(AggregateFunction::Avg),
            "MIN" => Ok(AggregateFunction::Min),
            "MAX" => Ok(AggregateFunction::Max),
            other => Err(RowmapError::Configuration(format!(
                "unsupported aggregate function '{other}'"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

/// Request for [`StorageAdapter::aggregate`].
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    /// Function name, validated against the closed set.
    pub function: String,
    /// Column or `*` for `COUNT`.
    pub field: String,
    /// Result column alias; defaults to the lowercased function name.
    pub alias: Option<String>,
    pub distinct: bool,
    pub conditions: Vec<Condition>,
    pub group_by: Vec<String>,
    pub having: Option<(String, Vec<SqlValue>)>,
}

impl AggregateOptions {
    pub fn new(function: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            field: field.into(),
            alias: None,
            distinct: false,
            conditions: Vec::new(),
            group_by: Vec::new(),
            having: None,
        }
    }
}

/// The per-dialect storage contract plus the generic operations derived
/// from it.
///
/// Primitives (`connect` through `database_info`) must be implemented by
/// each dialect; everything else has a shared default implementation that
/// only goes through `create_query_builder`, `query`, `query_single` and
/// `execute`.
#[async_trait]
pub trait StorageAdapter: Send + Sync + std::fmt::Debug {
    // ------------------------------------------------------------------
    // Primitive contract
    // ------------------------------------------------------------------

    async fn connect(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;

    fn dialect(&self) -> Dialect;

    fn date_functions(&self) -> &dyn DateFunctions;

    /// The transaction nesting counter owned by this instance.
    ///
    /// This is bookkeeping, not a concurrency primitive: at most one logical
    /// transaction may be in flight per adapter instance at a time.
    fn transaction_depth(&self) -> &AtomicUsize;

    /// A query builder attached to this adapter and its dialect.
    fn create_query_builder(&self) -> QueryBuilder<'_>;

    async fn begin_transaction(&self, behavior: Option<TransactionBehavior>) -> Result<()>;

    async fn commit_transaction(&self) -> Result<()>;

    async fn rollback_transaction(&self) -> Result<()>;

    async fn query(&self, sql: &str, params: Vec<SqlValue>) -> Result<Vec<Row>>;

    async fn query_single(&self, sql: &str, params: Vec<SqlValue>) -> Result<Option<Row>>;

    async fn execute(&self, sql: &str, params: Vec<SqlValue>) -> Result<ExecuteResult>;

    /// Runs a multi-statement script, e.g. schema DDL.
    async fn execute_script(&self, sql: &str) -> Result<()>;

    async fn database_info(&self) -> Result<DatabaseInfo>;

    // ------------------------------------------------------------------
    // Derived generic operations
    // ------------------------------------------------------------------

    async fn find_by_id(&self, table: &str, id_column: &str, id: SqlValue) -> Result<Option<Row>> {
        self.create_query_builder()
            .from(table, None)
            .where_condition(&Condition::eq(id_column, id))
            .get_one()
            .await
    }

    async fn find_all(&self, table: &str, options: FindOptions) -> Result<Vec<Row>> {
        let builder = self.create_query_builder().from(table, None);
        options.apply(builder, table)?.execute().await
    }

    async fn find_by(
        &self,
        table: &str,
        conditions: Vec<Condition>,
        options: FindOptions,
    ) -> Result<Vec<Row>> {
        let builder = self
            .create_query_builder()
            .from(table, None)
            .where_all(&conditions);
        options.apply(builder, table)?.execute().await
    }

    /// `find_by` with `LIMIT 1` forced, whatever the options say.
    async fn find_one_by(
        &self,
        table: &str,
        conditions: Vec<Condition>,
        options: FindOptions,
    ) -> Result<Option<Row>> {
        let builder = self
            .create_query_builder()
            .from(table, None)
            .where_all(&conditions);
        options.apply(builder, table)?.get_one().await
    }

    async fn count(&self, table: &str, conditions: Vec<Condition>) -> Result<u64> {
        let row = self
            .create_query_builder()
            .select(["COUNT(*) AS cnt"])
            .from(table, None)
            .where_all(&conditions)
            .get_one()
            .await?;
        Ok(row
            .as_ref()
            .and_then(|r| r.get("cnt"))
            .and_then(SqlValue::as_integer)
            .unwrap_or(0) as u64)
    }

    async fn exists(&self, table: &str, conditions: Vec<Condition>) -> Result<bool> {
        Ok(self.count(table, conditions).await? > 0)
    }

    async fn insert(
        &self,
        table: &str,
        values: Vec<(String, SqlValue)>,
    ) -> Result<ExecuteResult> {
        if values.is_empty() {
            return Err(RowmapError::Configuration(format!(
                "insert into '{table}' with no values"
            )));
        }
        let columns: Vec<&str> = values.iter().map(|(c, _)| c.as_str()).collect();
        let params: Vec<SqlValue> = values.iter().map(|(_, v)| v.clone()).collect();
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            vec!["?"; params.len()].join(", ")
        );
        self.execute_checked(&sql, params).await
    }

    /// Multi-row insert as a single `VALUES (…), (…)` statement. Returns
    /// the number of inserted rows.
    async fn bulk_insert(
        &self,
        table: &str,
        columns: Vec<String>,
        rows: Vec<Vec<SqlValue>>,
    ) -> Result<u64> {
        if columns.is_empty() || rows.is_empty() {
            return Ok(0);
        }
        let tuple = format!("({})", vec!["?"; columns.len()].join(", "));
        let mut params = Vec::with_capacity(columns.len() * rows.len());
        for row in rows {
            if row.len() != columns.len() {
                return Err(RowmapError::Configuration(format!(
                    "bulk insert into '{table}': row has {} values for {} columns",
                    row.len(),
                    columns.len()
                )));
            }
            params.extend(row);
        }
        let tuples = vec![tuple; params.len() / columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES {tuples}",
            columns.join(", ")
        );
        Ok(self.execute_checked(&sql, params).await?.changes)
    }

    async fn update(
        &self,
        table: &str,
        changes: Vec<(String, SqlValue)>,
        id_column: &str,
        id: SqlValue,
    ) -> Result<u64> {
        self.update_by(table, changes, vec![Condition::eq(id_column, id)])
            .await
    }

    async fn update_by(
        &self,
        table: &str,
        changes: Vec<(String, SqlValue)>,
        conditions: Vec<Condition>,
    ) -> Result<u64> {
        if changes.is_empty() {
            return Err(RowmapError::Configuration(format!(
                "update of '{table}' with no changed fields"
            )));
        }
        let assignments: Vec<String> =
            changes.iter().map(|(c, _)| format!("{c} = ?")).collect();
        let mut params: Vec<SqlValue> = changes.into_iter().map(|(_, v)| v).collect();
        let mut sql = format!("UPDATE {table} SET {}", assignments.join(", "));
        if !conditions.is_empty() {
            let (clause, mut condition_params) = Condition::render_all(&conditions);
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
            params.append(&mut condition_params);
        }
        Ok(self.execute_checked(&sql, params).await?.changes)
    }

    async fn delete(&self, table: &str, id_column: &str, id: SqlValue) -> Result<u64> {
        self.delete_by(table, vec![Condition::eq(id_column, id)]).await
    }

    async fn delete_by(&self, table: &str, conditions: Vec<Condition>) -> Result<u64> {
        let mut sql = format!("DELETE FROM {table}");
        let mut params = Vec::new();
        if !conditions.is_empty() {
            let (clause, mut condition_params) = Condition::render_all(&conditions);
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
            params.append(&mut condition_params);
        }
        Ok(self.execute_checked(&sql, params).await?.changes)
    }

    async fn find_with_join(
        &self,
        table: &str,
        alias: Option<&str>,
        joins: Vec<JoinSpec>,
        conditions: Vec<Condition>,
        options: FindOptions,
    ) -> Result<Vec<Row>> {
        let source_alias = alias.unwrap_or(table).to_string();
        let mut builder = self.create_query_builder().from(table, alias);
        for join in &joins {
            builder = builder.join(
                join.kind,
                join.table.clone(),
                join.alias.as_deref(),
                join.on.clone(),
                join.params.clone(),
            );
        }
        builder = builder.where_all(&conditions);
        options.apply(builder, &source_alias)?.execute().await
    }

    async fn find_one_with_join(
        &self,
        table: &str,
        alias: Option<&str>,
        joins: Vec<JoinSpec>,
        conditions: Vec<Condition>,
        options: FindOptions,
    ) -> Result<Option<Row>> {
        let source_alias = alias.unwrap_or(table).to_string();
        let mut builder = self.create_query_builder().from(table, alias);
        for join in &joins {
            builder = builder.join(
                join.kind,
                join.table.clone(),
                join.alias.as_deref(),
                join.on.clone(),
                join.params.clone(),
            );
        }
        builder = builder.where_all(&conditions);
        options.apply(builder, &source_alias)?.get_one().await
    }

    /// Runs one aggregate over `table`. `group_by` fields are always part
    /// of the select list so every result row carries its grouping key.
    async fn aggregate(&self, table: &str, options: AggregateOptions) -> Result<Vec<Row>> {
        let function = AggregateFunction::parse(&options.function)?;
        let alias = options
            .alias
            .clone()
            .unwrap_or_else(|| function.as_str().to_ascii_lowercase());
        let expr = if options.distinct {
            format!("{}(DISTINCT {}) AS {alias}", function.as_str(), options.field)
        } else {
            format!("{}({}) AS {alias}", function.as_str(), options.field)
        };

        let mut select = options.group_by.clone();
        select.push(expr);

        let mut builder = self
            .create_query_builder()
            .select(select)
            .from(table, None)
            .where_all(&options.conditions);
        if !options.group_by.is_empty() {
            builder = builder.group_by(options.group_by.iter().cloned());
        }
        if let Some((clause, params)) = options.having {
            builder = builder.having(clause, params);
        }
        builder.execute().await
    }

    /// `execute` with the placeholder/parameter count invariant asserted
    /// and the SQL finalized for this dialect.
    async fn execute_checked(&self, sql: &str, params: Vec<SqlValue>) -> Result<ExecuteResult> {
        let expected = count_placeholders(sql);
        if expected != params.len() {
            return Err(RowmapError::PlaceholderMismatch {
                expected,
                actual: params.len(),
            });
        }
        let sql = self.dialect().finalize(sql);
        self.execute(&sql, params).await
    }
}

/// Nested-transaction support, blanket-implemented for every adapter.
///
/// The callback receives the same adapter as its transactional handle.
/// Nested calls share the outermost transaction: only the call that takes
/// the nesting counter from 0 to 1 issues `BEGIN`, and only the call that
/// returns it to 0 issues `COMMIT` or `ROLLBACK`. Any error inside the nest
/// rolls back everything and is rethrown unchanged.
///
/// Hard constraint: the counter assumes one logical transaction in flight
/// per adapter instance; invoking `transaction` concurrently from multiple
/// callers on the same instance is out of contract.
pub trait Transactional: StorageAdapter {
    fn transaction<'a, T, F>(&'a self, callback: F) -> BoxFuture<'a, Result<T>>
    where
        T: Send + 'a,
        F: FnOnce(&'a Self) -> BoxFuture<'a, Result<T>> + Send + 'a,
    {
        self.transaction_with(None, callback)
    }

    fn transaction_with<'a, T, F>(
        &'a self,
        behavior: Option<TransactionBehavior>,
        callback: F,
    ) -> BoxFuture<'a, Result<T>>
    where
        T: Send + 'a,
        F: FnOnce(&'a Self) -> BoxFuture<'a, Result<T>> + Send + 'a,
    {
        Box::pin(async move {
            let depth = self.transaction_depth();
            let level = depth.fetch_add(1, Ordering::SeqCst);
            if level == 0 {
                if let Err(err) = self.begin_transaction(behavior).await {
                    depth.fetch_sub(1, Ordering::SeqCst);
                    return Err(err);
                }
            }

            let result = callback(self).await;

            let outcome = match result {
                Ok(value) => {
                    if level == 0 {
                        match self.commit_transaction().await {
                            Ok(()) => Ok(value),
                            Err(err) => Err(err),
                        }
                    } else {
                        Ok(value)
                    }
                }
                Err(err) => {
                    if level == 0 {
                        if let Err(rollback_err) = self.rollback_transaction().await {
                            // The original error is the one the caller needs.
                            error!(error = %rollback_err, "rollback failed");
                        }
                    }
                    Err(err)
                }
            };

            depth.fetch_sub(1, Ordering::SeqCst);
            outcome
        })
    }
}

impl<A: StorageAdapter + ?Sized> Transactional for A {}
