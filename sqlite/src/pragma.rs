//! PRAGMA-based introspection used by the diagnostic surface.

use rowmap_core::Result;
use rusqlite::Connection;

/// Reads a single-value PRAGMA as text.
pub(crate) fn query_text(conn: &Connection, pragma: &str) -> Result<String> {
    let value: rusqlite::types::Value =
        conn.query_row(&format!("PRAGMA {pragma}"), [], |row| row.get(0))?;
    Ok(match value {
        rusqlite::types::Value::Null => String::new(),
        rusqlite::types::Value::Integer(i) => i.to_string(),
        rusqlite::types::Value::Real(r) => r.to_string(),
        rusqlite::types::Value::Text(s) => s,
        rusqlite::types::Value::Blob(_) => "<blob>".to_string(),
    })
}

/// User table names, excluding SQLite's internal tables.
pub(crate) fn table_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}
