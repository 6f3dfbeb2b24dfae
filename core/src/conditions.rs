//! Structured filter conditions and their positional rendering.

use crate::value::SqlValue;
use serde_json::Value as JsonValue;

/// Comparison operators supported by [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl Operator {
    fn sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }
}

/// The right-hand side of a condition.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConditionValue {
    #[default]
    None,
    Single(SqlValue),
    List(Vec<SqlValue>),
}

/// A single structured predicate over one (physical) field.
///
/// Rendering is positional: the clause text and the parameter list are
/// produced together so placeholder order always matches parameter order.
///
/// ```
/// use rowmap_core::conditions::Condition;
///
/// let (clause, params) = Condition::eq("role", "admin").render();
/// assert_eq!(clause, "role = ?");
/// assert_eq!(params.len(), 1);
///
/// // An empty IN list can never match; `IN ()` is not valid SQL.
/// let (clause, params) = Condition::in_list("id", Vec::new()).render();
/// assert_eq!(clause, "0 = 1");
/// assert!(params.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: ConditionValue,
}

impl Condition {
    pub fn new(
        field: impl Into<String>,
        operator: Operator,
        value: ConditionValue,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::comparison(field, Operator::Eq, value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::comparison(field, Operator::Ne, value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::new(field, Operator::Gt, ConditionValue::Single(value.into()))
    }

    pub fn gte(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::new(field, Operator::Gte, ConditionValue::Single(value.into()))
    }

    pub fn lt(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::new(field, Operator::Lt, ConditionValue::Single(value.into()))
    }

    pub fn lte(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::new(field, Operator::Lte, ConditionValue::Single(value.into()))
    }

    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(
            field,
            Operator::Like,
            ConditionValue::Single(SqlValue::Text(pattern.into())),
        )
    }

    pub fn in_list(field: impl Into<String>, values: Vec<SqlValue>) -> Self {
        Self::new(field, Operator::In, ConditionValue::List(values))
    }

    pub fn not_in_list(field: impl Into<String>, values: Vec<SqlValue>) -> Self {
        Self::new(field, Operator::NotIn, ConditionValue::List(values))
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNull, ConditionValue::None)
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNotNull, ConditionValue::None)
    }

    /// Builds a condition from a JSON filter value the way an equality map
    /// is interpreted: `null` → `IS NULL`, array → `IN (…)`, scalar → `=`.
    pub fn from_json(field: impl Into<String>, value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::is_null(field),
            JsonValue::Array(items) => {
                Self::in_list(field, items.iter().map(SqlValue::from_json).collect())
            }
            other => Self::eq(field, SqlValue::from_json(other)),
        }
    }

    /// Eq/Ne with a null value degrade to the IS NULL forms.
    fn comparison(field: impl Into<String>, operator: Operator, value: SqlValue) -> Self {
        if value.is_null() {
            let operator = match operator {
                Operator::Ne => Operator::IsNotNull,
                _ => Operator::IsNull,
            };
            return Self::new(field, operator, ConditionValue::None);
        }
        Self::new(field, operator, ConditionValue::Single(value))
    }

    /// Renders this condition as a `?`-positional clause plus its parameters.
    pub fn render(&self) -> (String, Vec<SqlValue>) {
        match (&self.operator, &self.value) {
            (Operator::IsNull, _) => (format!("{} IS NULL", self.field), Vec::new()),
            (Operator::IsNotNull, _) => (format!("{} IS NOT NULL", self.field), Vec::new()),
            (Operator::In, ConditionValue::List(values)) if values.is_empty() => {
                // `IN ()` is invalid SQL and must never match all rows.
                ("0 = 1".to_string(), Vec::new())
            }
            (Operator::NotIn, ConditionValue::List(values)) if values.is_empty() => {
                ("1 = 1".to_string(), Vec::new())
            }
            (op @ (Operator::In | Operator::NotIn), ConditionValue::List(values)) => {
                let markers = vec!["?"; values.len()].join(", ");
                (
                    format!("{} {} ({})", self.field, op.sql(), markers),
                    values.clone(),
                )
            }
            (op, ConditionValue::Single(value)) => (
                format!("{} {} ?", self.field, op.sql()),
                vec![value.clone()],
            ),
            (op, _) => (format!("{} {} ?", self.field, op.sql()), vec![SqlValue::Null]),
        }
    }

    /// Renders a conjunction of conditions joined with `AND`.
    pub fn render_all(conditions: &[Condition]) -> (String, Vec<SqlValue>) {
        let mut clauses = Vec::with_capacity(conditions.len());
        let mut params = Vec::new();
        for condition in conditions {
            let (clause, mut p) = condition.render();
            clauses.push(clause);
            params.append(&mut p);
        }
        (clauses.join(" AND "), params)
    }
}
