//! Scalar value model, rows, and composite keys
//!
//! Cell values are a closed tagged variant rather than dynamic JSON, so the
//! numeric-vs-exact comparison rule in the engine is a single exhaustive
//! match. Floats are compared bitwise for identity purposes (hashing, key
//! equality); tolerance-based comparison lives in the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// A scalar cell value
///
/// Serialized untagged so report JSON carries raw scalars
/// (`10`, `10.5`, `"x"`, `true`, `null`, `"2024-01-01T00:00:00Z"`).
///
/// Untagged deserialization tries variants in declaration order, so a JSON
/// string that parses as RFC 3339 comes back as `Timestamp`, not `Text`.
/// A re-parsed report is therefore not type-faithful for timestamp-shaped
/// text cells; the report is an output format, not a storage format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL, or a column absent from a row
    Null,

    /// Boolean
    Bool(bool),

    /// Integer (any warehouse integer width)
    Int(i64),

    /// Floating point
    Float(f64),

    /// Timestamp (UTC, RFC 3339 in JSON)
    Timestamp(DateTime<Utc>),

    /// String/text
    Text(String),
}

impl Value {
    /// Numeric view of this value, if it has one
    ///
    /// Only `Int` and `Float` are numeric; there is no coercion from
    /// strings or booleans.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Check if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Stable name of the value's type, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Timestamp(_) => "timestamp",
            Self::Text(_) => "text",
        }
    }

    /// Rank used to order values of different types
    fn type_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) => 2,
            Self::Float(_) => 3,
            Self::Timestamp(_) => 4,
            Self::Text(_) => 5,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            // Bitwise identity: NaN == NaN, 0.0 != -0.0. Tolerance-based
            // equality is the engine's concern, not the value model's.
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_rank().hash(state);
        match self {
            Self::Null => {}
            Self::Bool(v) => v.hash(state),
            Self::Int(v) => v.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::Timestamp(v) => v.hash(state),
            Self::Text(v) => v.hash(state),
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

static NULL: Value = Value::Null;

/// A single row: column name mapped to scalar value
///
/// Within one row-set all rows carry the same column set; normalizing to
/// that invariant is the adapter's job, not the engine's. A column absent
/// from a row reads as `Value::Null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    /// Column values, ordered by column name for deterministic output
    pub values: BTreeMap<String, Value>,
}

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from (column, value) pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Set a column value
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    /// Get a column value; absent columns read as NULL
    pub fn get(&self, column: &str) -> &Value {
        self.values.get(column).unwrap_or(&NULL)
    }

    /// Check whether the column is present at all (even as NULL)
    pub fn contains_column(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    /// Column names present in this row
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }
}

/// Composite key: the ordered tuple of key-column values for one row
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Key(pub Vec<Value>);

impl Key {
    /// Extract the key tuple from a row, in key-column order
    pub fn from_row(row: &Row, key_columns: &[String]) -> Self {
        Self(
            key_columns
                .iter()
                .map(|col| row.get(col).clone())
                .collect(),
        )
    }

    /// Pair the key values back with their column names
    pub fn labeled(&self, key_columns: &[String]) -> BTreeMap<String, Value> {
        key_columns
            .iter()
            .cloned()
            .zip(self.0.iter().cloned())
            .collect()
    }
}
