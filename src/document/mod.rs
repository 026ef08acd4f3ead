//! Document data model for graphstore
//!
//! A document is an identifier, a text content blob, and a metadata map
//! restricted to three scalar types. The restriction is enforced by the
//! type system: [`MetaValue`] is a closed sum type, so an unsupported
//! metadata type cannot reach the storage layer at all. Openness lives at
//! one boundary only — [`Metadata::from_json`] — where unsupported values
//! are dropped with an explicit, returned record of what was lost.
//!
//! # Invariants
//!
//! - A metadata key exists in at most one typed bucket at a time.
//! - `codec::decode(codec::encode(m)) == m` for every metadata map `m`.

pub mod codec;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single metadata value. Exactly the three scalar types the typed
/// storage columns can hold.
///
/// `Int` is listed before `Float` so that untagged deserialization types
/// `4` as an integer and `4.5` as a float.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    /// 64-bit integer value, stored in the `meta_INT` column
    Int(i64),
    /// Floating-point value, stored in the `meta_FLOAT` column
    Float(f64),
    /// String value, stored in the `meta_STRING` column
    Str(String),
}

impl MetaValue {
    /// Returns the typed storage column this value routes to.
    pub fn column(&self) -> &'static str {
        match self {
            MetaValue::Str(_) => "meta_STRING",
            MetaValue::Int(_) => "meta_INT",
            MetaValue::Float(_) => "meta_FLOAT",
        }
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Str(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::Str(v)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::Int(v)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Float(v)
    }
}

/// Document metadata: string keys, scalar values, deterministic order.
pub type Metadata = BTreeMap<String, MetaValue>;

/// Converts a loose JSON object into [`Metadata`].
///
/// Values that are not a string, integer, or float are dropped; the keys
/// of the dropped entries are returned alongside the converted map and
/// logged at warning level. This is a documented data-loss boundary, not
/// an error.
pub fn metadata_from_json(object: &serde_json::Map<String, serde_json::Value>) -> (Metadata, Vec<String>) {
    let mut meta = Metadata::new();
    let mut dropped = Vec::new();

    for (key, value) in object {
        match value {
            serde_json::Value::String(s) => {
                meta.insert(key.clone(), MetaValue::Str(s.clone()));
            }
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    meta.insert(key.clone(), MetaValue::Int(i));
                } else if let Some(f) = n.as_f64() {
                    meta.insert(key.clone(), MetaValue::Float(f));
                } else {
                    dropped.push(key.clone());
                }
            }
            // bool, null, arrays, objects have no typed column
            _ => dropped.push(key.clone()),
        }
    }

    if !dropped.is_empty() {
        tracing::warn!(keys = ?dropped, "dropped metadata values of unsupported type");
    }

    (meta, dropped)
}

/// The unit of storage: identifier, content, metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier (caller-supplied or generated)
    pub id: String,
    /// Text content
    pub content: String,
    /// Scalar metadata map
    #[serde(default)]
    pub meta: Metadata,
}

impl Document {
    /// Creates a document with a generated v4 UUID identifier.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            meta: Metadata::new(),
        }
    }

    /// Creates a document with a caller-supplied identifier.
    pub fn with_id(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            meta: Metadata::new(),
        }
    }

    /// Adds a metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}
