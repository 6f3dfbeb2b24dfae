//! SQLite date-function expressions.

use rowmap_core::{DateFunctions, DateUnit};

fn unit_name(unit: DateUnit) -> &'static str {
    match unit {
        DateUnit::Seconds => "seconds",
        DateUnit::Minutes => "minutes",
        DateUnit::Hours => "hours",
        DateUnit::Days => "days",
    }
}

/// SQL expression builders over SQLite's `datetime`/`julianday`/`strftime`.
///
/// ```
/// use rowmap_core::{DateFunctions, DateUnit};
/// use rowmap_sqlite::SqliteDateFunctions;
///
/// let dates = SqliteDateFunctions;
/// assert_eq!(dates.now(), "datetime('now')");
/// assert_eq!(
///     dates.add("created_at", -7, DateUnit::Days),
///     "datetime(created_at, '-7 days')"
/// );
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDateFunctions;

impl DateFunctions for SqliteDateFunctions {
    fn now(&self) -> String {
        "datetime('now')".to_string()
    }

    fn diff(&self, unit: DateUnit, start: &str, end: &str) -> String {
        let per_day: i64 = match unit {
            DateUnit::Seconds => 86_400,
            DateUnit::Minutes => 1_440,
            DateUnit::Hours => 24,
            DateUnit::Days => 1,
        };
        if per_day == 1 {
            format!("CAST(julianday({end}) - julianday({start}) AS INTEGER)")
        } else {
            format!("CAST((julianday({end}) - julianday({start})) * {per_day} AS INTEGER)")
        }
    }

    fn add(&self, expr: &str, amount: i64, unit: DateUnit) -> String {
        format!("datetime({expr}, '{amount:+} {}')", unit_name(unit))
    }

    fn format(&self, expr: &str, format: &str) -> String {
        format!("strftime('{format}', {expr})")
    }

    fn validate(&self, expr: &str) -> String {
        format!("datetime({expr}) IS NOT NULL")
    }
}
