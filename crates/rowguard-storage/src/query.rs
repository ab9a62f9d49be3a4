//! Read queries and their predicates.
//!
//! A [`Query`] names an entity type and a [`Predicate`] tree. Stores either
//! evaluate the predicate directly ([`Predicate::matches`]) or render it to a
//! parameterised SQL `WHERE` fragment ([`Predicate::to_sql`]).

use serde::{Deserialize, Serialize};

use crate::record::{CacheField, Record};
use crate::value::Value;

/// A column a predicate can test.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    /// Record id.
    Id,
    /// A declared attribute.
    Field(String),
    /// `access_level_cache`
    AccessLevel,
    /// `access_permitted_users_cache`
    PermittedUsers,
}

impl Column {
    /// Shorthand for [`Column::Field`].
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    fn value_of(&self, record: &Record) -> Value {
        match self {
            Self::Id => Value::Int(i64::try_from(record.id().get()).unwrap_or(i64::MAX)),
            Self::Field(name) => record.get(name).clone(),
            Self::AccessLevel => record.access().column_value(CacheField::AccessLevel),
            Self::PermittedUsers => record.access().column_value(CacheField::PermittedUsers),
        }
    }

    fn sql_name(&self) -> String {
        match self {
            Self::Id => "\"id\"".to_string(),
            Self::Field(name) => format!("\"{}\"", name.replace('"', "\"\"")),
            Self::AccessLevel => CacheField::AccessLevel.column().to_string(),
            Self::PermittedUsers => CacheField::PermittedUsers.column().to_string(),
        }
    }
}

/// Boolean filter over a record.
///
/// Comparisons against a NULL column are false, as in SQL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Matches everything.
    All,
    /// Column equals value.
    Eq(Column, Value),
    /// Column is non-null and differs from value.
    Ne(Column, Value),
    /// Text column contains the substring (unanchored).
    Contains(Column, String),
    /// All sub-predicates match.
    And(Vec<Predicate>),
    /// Any sub-predicate matches.
    Or(Vec<Predicate>),
    /// Sub-predicate does not match.
    Not(Box<Predicate>),
}

/// A rendered SQL condition with positional `?` parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqlFragment {
    /// Condition text.
    pub sql: String,
    /// Parameters in order of appearance.
    pub params: Vec<Value>,
}

impl Predicate {
    /// Column equals value.
    pub fn eq(column: Column, value: impl Into<Value>) -> Self {
        Self::Eq(column, value.into())
    }

    /// Column differs from value.
    pub fn ne(column: Column, value: impl Into<Value>) -> Self {
        Self::Ne(column, value.into())
    }

    /// Conjunction that flattens nested `And` and drops `All`.
    pub fn and(self, other: Predicate) -> Self {
        match (self, other) {
            (Self::All, p) | (p, Self::All) => p,
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), p) => {
                left.push(p);
                Self::And(left)
            }
            (p, Self::And(mut right)) => {
                right.insert(0, p);
                Self::And(right)
            }
            (left, right) => Self::And(vec![left, right]),
        }
    }

    /// Evaluates against a record.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::All => true,
            Self::Eq(column, value) => {
                let actual = column.value_of(record);
                !actual.is_null() && actual == *value
            }
            Self::Ne(column, value) => {
                let actual = column.value_of(record);
                !actual.is_null() && actual != *value
            }
            Self::Contains(column, needle) => column
                .value_of(record)
                .as_text()
                .is_some_and(|text| text.contains(needle.as_str())),
            Self::And(parts) => parts.iter().all(|p| p.matches(record)),
            Self::Or(parts) => parts.iter().any(|p| p.matches(record)),
            Self::Not(inner) => !inner.matches(record),
        }
    }

    /// Renders to a parameterised SQL condition.
    ///
    /// # Example
    ///
    /// ```rust
    /// use rowguard_storage::query::{Column, Predicate};
    ///
    /// let fragment = Predicate::eq(Column::AccessLevel, "public").to_sql();
    /// assert_eq!(fragment.sql, "access_level_cache = ?");
    /// ```
    pub fn to_sql(&self) -> SqlFragment {
        let mut params = Vec::new();
        let sql = self.render(&mut params);
        SqlFragment { sql, params }
    }

    fn render(&self, params: &mut Vec<Value>) -> String {
        match self {
            Self::All => "TRUE".to_string(),
            Self::Eq(column, value) => {
                params.push(value.clone());
                format!("{} = ?", column.sql_name())
            }
            Self::Ne(column, value) => {
                params.push(value.clone());
                format!("{} <> ?", column.sql_name())
            }
            Self::Contains(column, needle) => {
                params.push(Value::Text(format!("%{}%", escape_like(needle))));
                format!("{} LIKE ? ESCAPE '\\'", column.sql_name())
            }
            Self::And(parts) => join(parts, " AND ", "TRUE", params),
            Self::Or(parts) => join(parts, " OR ", "FALSE", params),
            Self::Not(inner) => format!("NOT ({})", inner.render(params)),
        }
    }
}

fn join(parts: &[Predicate], separator: &str, empty: &str, params: &mut Vec<Value>) -> String {
    if parts.is_empty() {
        return empty.to_string();
    }
    let rendered: Vec<String> = parts
        .iter()
        .map(|p| format!("({})", p.render(params)))
        .collect();
    rendered.join(separator)
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// A read over one entity type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Entity type to read.
    pub entity_type: String,
    /// Filter.
    pub predicate: Predicate,
    /// Maximum number of rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Query {
    /// Every record of `entity_type`.
    pub fn all(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            predicate: Predicate::All,
            limit: None,
        }
    }

    /// Narrows the query with an additional condition.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = std::mem::replace(&mut self.predicate, Predicate::All).and(predicate);
        self
    }

    /// Caps the number of rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
