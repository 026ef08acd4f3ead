//! Graph query engine seam for graphstore
//!
//! The document store talks to its engine through one narrow interface:
//! execute a parameterized query string, get rows back. [`GraphEngine`] is
//! that seam; [`MemoryEngine`] is the embedded implementation, a small
//! engine that understands exactly the Cypher-subset statement shapes the
//! store emits and persists its table to disk behind a checksum-framed
//! snapshot.
//!
//! # Query language
//!
//! - `CREATE NODE TABLE IF NOT EXISTS <name>(...)`
//! - `CREATE (d:<table> {prop: $param, ...})`
//! - `MATCH (d:<table>) [WHERE <expr>] RETURN <item> [AS <alias>], ... [LIMIT n]`
//! - `MATCH (d:<table>) [WHERE <expr>] DELETE d`
//!
//! Predicate expressions support field access (`d.id`), typed-map lookup
//! (`d.meta_INT['rating']`), parameters (`$id`), string/int/float/NULL
//! literals, `= <> < <= > >=`, `IN [..]`, `CONTAINS`, `AND`/`OR`/`NOT`,
//! and parentheses. NULL and missing values never match a comparison.

mod memory;
mod predicate;
mod snapshot;

pub use memory::MemoryEngine;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-level failures. The store propagates these unmodified.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Query syntax error: {0}")]
    Syntax(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown query parameter: ${0}")]
    UnknownParameter(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Primary key already exists: {0}")]
    DuplicateKey(String),

    #[error("Snapshot corruption: {0}")]
    Corruption(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// A typed engine value: the scalar types plus the three typed map
/// column types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    StrMap(BTreeMap<String, String>),
    IntMap(BTreeMap<String, i64>),
    FloatMap(BTreeMap<String, f64>),
}

impl Value {
    /// Returns the string payload, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

/// Named query parameters. Structured values (ids, content, metadata maps)
/// always travel as parameters, never as inline literals.
pub type Params = BTreeMap<String, Value>;

/// One result row: labeled cells in projection order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    cells: Vec<(String, Value)>,
}

impl Row {
    pub(crate) fn new(cells: Vec<(String, Value)>) -> Self {
        Self { cells }
    }

    /// Returns the cell with the given label.
    pub fn get(&self, label: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, value)| value)
    }
}

/// A fully materialized result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    rows: Vec<Row>,
}

impl Rows {
    pub(crate) fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the first row, if any.
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }
}

impl IntoIterator for Rows {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// The store's view of a graph query engine.
pub trait GraphEngine {
    /// Executes one parameterized query and returns its rows.
    fn execute(&mut self, query: &str, params: Params) -> EngineResult<Rows>;
}

/// One stored node of the `documents` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRow {
    pub id: String,
    pub content: String,
    pub meta_string: BTreeMap<String, String>,
    pub meta_int: BTreeMap<String, i64>,
    pub meta_float: BTreeMap<String, f64>,
}

impl StoredRow {
    /// Resolves a column of this row to an engine value.
    ///
    /// Unknown columns resolve to `Null`, which never matches a predicate.
    pub(crate) fn column(&self, name: &str) -> Value {
        match name {
            "id" => Value::Str(self.id.clone()),
            "content" => Value::Str(self.content.clone()),
            "meta_STRING" => Value::StrMap(self.meta_string.clone()),
            "meta_INT" => Value::IntMap(self.meta_int.clone()),
            "meta_FLOAT" => Value::FloatMap(self.meta_float.clone()),
            _ => Value::Null,
        }
    }

    /// Resolves a typed-map lookup (`d.<column>['<key>']`) to a scalar.
    pub(crate) fn map_lookup(&self, column: &str, key: &str) -> Value {
        match column {
            "meta_STRING" => self
                .meta_string
                .get(key)
                .map(|v| Value::Str(v.clone()))
                .unwrap_or(Value::Null),
            "meta_INT" => self
                .meta_int
                .get(key)
                .map(|v| Value::Int(*v))
                .unwrap_or(Value::Null),
            "meta_FLOAT" => self
                .meta_float
                .get(key)
                .map(|v| Value::Float(*v))
                .unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }
}
