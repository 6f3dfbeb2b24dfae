//! The rusqlite-backed adapter.
//!
//! One logical connection per instance; callers serialize on an internal
//! lock, and nothing awaits while the lock is held. The driver itself is
//! synchronous, so suspension only happens between statements.

use crate::dates::SqliteDateFunctions;
use crate::pragma;
use async_trait::async_trait;
use rowmap_core::adapter::{
    DatabaseInfo, DateFunctions, StorageAdapter, TransactionBehavior,
};
use rowmap_core::{
    Dialect, ExecuteResult, QueryBuilder, Result, Row, RowmapError, SqlValue,
};
use rusqlite::{Connection, params_from_iter};
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use tracing::debug;

/// The reference SQLite adapter. `":memory:"` opens an in-memory database.
pub struct SqliteAdapter {
    path: String,
    conn: Mutex<Option<Connection>>,
    depth: AtomicUsize,
    dates: SqliteDateFunctions,
}

impl SqliteAdapter {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            conn: Mutex::new(None),
            depth: AtomicUsize::new(0),
            dates: SqliteDateFunctions,
        }
    }

    /// An adapter over a private in-memory database.
    pub fn memory() -> Self {
        Self::new(":memory:")
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Runs `f` against the live connection, failing when not connected.
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self
            .conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let conn = guard.as_ref().ok_or(RowmapError::NotConnected)?;
        f(conn)
    }
}

impl std::fmt::Debug for SqliteAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAdapter")
            .field("path", &self.path)
            .finish()
    }
}

fn to_rusqlite(value: &SqlValue) -> rusqlite::types::Value {
    match value {
        SqlValue::Null => rusqlite::types::Value::Null,
        SqlValue::Integer(i) => rusqlite::types::Value::Integer(*i),
        SqlValue::Real(r) => rusqlite::types::Value::Real(*r),
        SqlValue::Text(s) => rusqlite::types::Value::Text(s.clone()),
        SqlValue::Blob(b) => rusqlite::types::Value::Blob(b.clone()),
    }
}

fn from_rusqlite(value: rusqlite::types::ValueRef<'_>) -> SqlValue {
    match value {
        rusqlite::types::ValueRef::Null => SqlValue::Null,
        rusqlite::types::ValueRef::Integer(i) => SqlValue::Integer(i),
        rusqlite::types::ValueRef::Real(r) => SqlValue::Real(r),
        rusqlite::types::ValueRef::Text(t) => {
            SqlValue::Text(String::from_utf8_lossy(t).into_owned())
        }
        rusqlite::types::ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
    }
}

fn run_query(conn: &Connection, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let column_count = columns.len();

    let mut rows = stmt.query(params_from_iter(params.iter().map(to_rusqlite)))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(column_count);
        for index in 0..column_count {
            values.push(from_rusqlite(row.get_ref(index)?));
        }
        out.push(Row::new(columns.clone(), values));
    }
    Ok(out)
}

#[async_trait]
impl StorageAdapter for SqliteAdapter {
    async fn connect(&self) -> Result<()> {
        let mut guard = self
            .conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.is_some() {
            return Ok(());
        }
        let conn = if self.path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(&self.path)?
        };
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        debug!(path = %self.path, "sqlite connection opened");
        *guard = Some(conn);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self
            .conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(conn) = guard.take() {
            drop(conn);
            debug!(path = %self.path, "sqlite connection closed");
        }
        Ok(())
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn date_functions(&self) -> &dyn DateFunctions {
        &self.dates
    }

    fn transaction_depth(&self) -> &AtomicUsize {
        &self.depth
    }

    fn create_query_builder(&self) -> QueryBuilder<'_> {
        QueryBuilder::for_adapter(self)
    }

    async fn begin_transaction(&self, behavior: Option<TransactionBehavior>) -> Result<()> {
        let verb = match behavior.unwrap_or_default() {
            TransactionBehavior::Deferred => "BEGIN DEFERRED",
            TransactionBehavior::Immediate => "BEGIN IMMEDIATE",
            TransactionBehavior::Exclusive => "BEGIN EXCLUSIVE",
        };
        self.with_conn(|conn| Ok(conn.execute_batch(verb)?))
    }

    async fn commit_transaction(&self) -> Result<()> {
        self.with_conn(|conn| Ok(conn.execute_batch("COMMIT")?))
    }

    async fn rollback_transaction(&self) -> Result<()> {
        self.with_conn(|conn| Ok(conn.execute_batch("ROLLBACK")?))
    }

    async fn query(&self, sql: &str, params: Vec<SqlValue>) -> Result<Vec<Row>> {
        self.with_conn(|conn| run_query(conn, sql, &params))
    }

    async fn query_single(&self, sql: &str, params: Vec<SqlValue>) -> Result<Option<Row>> {
        self.with_conn(|conn| Ok(run_query(conn, sql, &params)?.into_iter().next()))
    }

    async fn execute(&self, sql: &str, params: Vec<SqlValue>) -> Result<ExecuteResult> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let changes = stmt.execute(params_from_iter(params.iter().map(to_rusqlite)))?;
            let last_insert_rowid = sql
                .trim_start()
                .get(..6)
                .filter(|prefix| prefix.eq_ignore_ascii_case("INSERT"))
                .map(|_| conn.last_insert_rowid());
            Ok(ExecuteResult {
                changes: changes as u64,
                last_insert_rowid,
            })
        })
    }

    async fn execute_script(&self, sql: &str) -> Result<()> {
        self.with_conn(|conn| Ok(conn.execute_batch(sql)?))
    }

    async fn database_info(&self) -> Result<DatabaseInfo> {
        self.with_conn(|conn| {
            let tables = pragma::table_names(conn)?;
            let mut settings = std::collections::BTreeMap::new();
            for pragma_name in ["journal_mode", "foreign_keys", "cache_size"] {
                settings.insert(
                    pragma_name.to_string(),
                    pragma::query_text(conn, pragma_name)?,
                );
            }
            Ok(DatabaseInfo {
                engine: "sqlite".to_string(),
                table_count: tables.len(),
                tables,
                settings,
            })
        })
    }
}
