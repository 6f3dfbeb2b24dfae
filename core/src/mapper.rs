//! Translation between raw rows and logical entities.

use crate::Entity;
use crate::row::Row;
use crate::schema::{ColumnType, EntityConfig};
use crate::value::SqlValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps between physical rows and logical entities for one [`EntityConfig`].
#[derive(Debug, Clone)]
pub struct EntityMapper {
    config: Arc<EntityConfig>,
    logical_index: HashMap<String, usize>,
    physical_index: HashMap<String, usize>,
}

impl EntityMapper {
    pub fn new(config: Arc<EntityConfig>) -> Self {
        let logical_index = config
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.logical.clone(), i))
            .collect();
        let physical_index = config
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.physical.clone(), i))
            .collect();
        Self {
            config,
            logical_index,
            physical_index,
        }
    }

    pub fn config(&self) -> &EntityConfig {
        &self.config
    }

    pub fn logical_to_physical(&self, logical: &str) -> Option<&str> {
        self.logical_index
            .get(logical)
            .map(|&i| self.config.columns[i].physical.as_str())
    }

    pub fn physical_to_logical(&self, physical: &str) -> Option<&str> {
        self.physical_index
            .get(physical)
            .map(|&i| self.config.columns[i].logical.as_str())
    }

    /// Converts a row into a logical entity, coercing each configured column
    /// present in the row. Unconfigured row columns are ignored.
    pub fn to_entity(&self, row: &Row) -> Entity {
        let mut entity = Entity::new();
        for column in &self.config.columns {
            if let Some(value) = row.get(&column.physical) {
                entity.insert(
                    column.logical.clone(),
                    coerce(value, column.column_type),
                );
            }
        }
        entity
    }

    pub fn to_entities(&self, rows: &[Row]) -> Vec<Entity> {
        rows.iter().map(|row| self.to_entity(row)).collect()
    }

    /// Converts logical fields into `(physical column, value)` pairs.
    ///
    /// Keys without a configured column are dropped; they must never leak
    /// into SQL.
    pub fn to_physical(&self, entity: &Entity) -> Vec<(String, SqlValue)> {
        let mut pairs = Vec::with_capacity(entity.len());
        for column in &self.config.columns {
            if let Some(value) = entity.get(&column.logical) {
                pairs.push((
                    column.physical.clone(),
                    to_sql_value(value, column.column_type),
                ));
            }
        }
        pairs
    }
}

/// Coerces a raw driver value into the JSON form of the configured type.
///
/// Unknown or absent types pass through; a value that cannot be coerced is
/// returned raw rather than lost.
pub fn coerce(value: &SqlValue, column_type: Option<ColumnType>) -> JsonValue {
    let Some(column_type) = column_type else {
        return value.to_json();
    };
    if value.is_null() {
        return JsonValue::Null;
    }
    match column_type {
        ColumnType::Boolean => match value {
            SqlValue::Integer(i) => JsonValue::Bool(*i != 0),
            SqlValue::Real(r) => JsonValue::Bool(*r != 0.0),
            SqlValue::Text(s) => match s.as_str() {
                "true" | "TRUE" | "1" => JsonValue::Bool(true),
                "false" | "FALSE" | "0" => JsonValue::Bool(false),
                _ => value.to_json(),
            },
            _ => value.to_json(),
        },
        ColumnType::Integer => match value.as_integer() {
            Some(i) => JsonValue::from(i),
            None => value.to_json(),
        },
        ColumnType::Real => match value {
            SqlValue::Real(r) => JsonValue::from(*r),
            SqlValue::Integer(i) => JsonValue::from(*i as f64),
            SqlValue::Text(s) => s
                .parse::<f64>()
                .map(JsonValue::from)
                .unwrap_or_else(|_| value.to_json()),
            _ => value.to_json(),
        },
        ColumnType::Text => match value {
            SqlValue::Text(_) => value.to_json(),
            SqlValue::Integer(i) => JsonValue::String(i.to_string()),
            SqlValue::Real(r) => JsonValue::String(r.to_string()),
            _ => value.to_json(),
        },
        ColumnType::Date => coerce_date(value, true),
        ColumnType::DateTime | ColumnType::Timestamp => coerce_date(value, false),
        ColumnType::Json => match value {
            SqlValue::Text(s) => {
                // Fall back to the raw text when it is not valid JSON.
                serde_json::from_str(s).unwrap_or_else(|_| value.to_json())
            }
            _ => value.to_json(),
        },
        ColumnType::Blob => value.to_json(),
    }
}

fn coerce_date(value: &SqlValue, date_only: bool) -> JsonValue {
    let parsed: Option<DateTime<Utc>> = match value {
        SqlValue::Integer(seconds) => Utc.timestamp_opt(*seconds, 0).single(),
        SqlValue::Text(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|naive| Utc.from_utc_datetime(&naive))
            })
            .or_else(|| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|naive| Utc.from_utc_datetime(&naive))
            }),
        _ => None,
    };
    match parsed {
        Some(dt) if date_only => JsonValue::String(dt.date_naive().to_string()),
        Some(dt) => JsonValue::String(dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
        None => value.to_json(),
    }
}

/// Converts a logical JSON value into a bindable SQL value, honoring the
/// configured column type.
pub fn to_sql_value(value: &JsonValue, column_type: Option<ColumnType>) -> SqlValue {
    match (column_type, value) {
        (_, JsonValue::Null) => SqlValue::Null,
        (Some(ColumnType::Boolean), JsonValue::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        (Some(ColumnType::Boolean), JsonValue::Number(n)) => {
            SqlValue::Integer(i64::from(n.as_f64().unwrap_or(0.0) != 0.0))
        }
        (Some(ColumnType::Json), other) => match other {
            JsonValue::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Text(other.to_string()),
        },
        (Some(ColumnType::Blob), JsonValue::Array(items)) => SqlValue::Blob(
            items
                .iter()
                .filter_map(|v| v.as_u64().map(|b| b as u8))
                .collect(),
        ),
        (_, other) => SqlValue::from_json(other),
    }
}
