//! Placeholder dialects.
//!
//! The builder and the derived adapter operations always accumulate SQL with
//! positional `?` markers; the dialect decides what reaches the driver.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// The SQL placeholder dialect of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    Postgres,
    Mysql,
}

impl Dialect {
    /// Renders a placeholder for this dialect with the given 1-based index.
    ///
    /// # Examples
    /// - PostgreSQL: `$1`, `$2`, `$3`
    /// - SQLite/MySQL: `?`
    #[inline]
    pub fn render_placeholder(&self, index: usize) -> Cow<'static, str> {
        match self {
            Dialect::Postgres => Cow::Owned(format!("${index}")),
            Dialect::Sqlite | Dialect::Mysql => Cow::Borrowed("?"),
        }
    }

    /// A comma-separated placeholder list for `count` parameters, starting
    /// at 1-based index `start`.
    ///
    /// ```
    /// use rowmap_core::Dialect;
    ///
    /// assert_eq!(Dialect::Sqlite.placeholders(3, 1), "?, ?, ?");
    /// assert_eq!(Dialect::Postgres.placeholders(2, 3), "$3, $4");
    /// ```
    pub fn placeholders(&self, count: usize, start: usize) -> String {
        let mut out = String::with_capacity(count * 4);
        for i in 0..count {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&self.render_placeholder(start + i));
        }
        out
    }

    /// Rewrites `?`-positional SQL into this dialect's placeholder syntax.
    ///
    /// Markers inside single-quoted literals (with `''` escapes) are left
    /// untouched. SQLite and MySQL pass the text through unchanged.
    pub fn finalize(&self, sql: &str) -> String {
        match self {
            Dialect::Sqlite | Dialect::Mysql => sql.to_string(),
            Dialect::Postgres => {
                let mut out = String::with_capacity(sql.len() + 8);
                let mut index = 0usize;
                let mut in_string = false;
                for ch in sql.chars() {
                    match ch {
                        '\'' => {
                            in_string = !in_string;
                            out.push(ch);
                        }
                        '?' if !in_string => {
                            index += 1;
                            out.push('$');
                            out.push_str(&index.to_string());
                        }
                        _ => out.push(ch),
                    }
                }
                out
            }
        }
    }
}

/// Counts the positional markers in a `?`-style SQL string, ignoring
/// markers inside single-quoted literals.
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut in_string = false;
    for ch in sql.chars() {
        match ch {
            '\'' => in_string = !in_string,
            '?' if !in_string => count += 1,
            _ => {}
        }
    }
    count
}
