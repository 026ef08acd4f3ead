//! Document store orchestration for graphstore
//!
//! The store owns one engine for its lifetime and composes the metadata
//! codec (write/read paths) with the filter compiler (filtered reads).
//! Every operation is synchronous and single-threaded; writes span
//! several dependent queries (existence check, optional delete, insert)
//! with no atomicity across the span, so concurrent callers must be
//! serialized externally.
//!
//! # Write state machine (per document id)
//!
//! - ABSENT  + write (any policy)      -> PRESENT
//! - PRESENT + write (FAIL)            -> DuplicateDocument, batch aborts
//! - PRESENT + write (SKIP)            -> unchanged, not counted
//! - PRESENT + write (OVERWRITE/NONE)  -> delete then insert
//! - PRESENT + delete                  -> ABSENT
//! - ABSENT  + delete                  -> MissingDocument, batch aborts
//!
//! Batches are sequential, not transactional: a failure partway through
//! leaves the earlier documents committed.

use std::path::{Path, PathBuf};

use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::document::{codec, Document, MetaValue};
use crate::engine::{
    EngineError, GraphEngine, MemoryEngine, Params, Row, Value,
};
use crate::filter::{self, FilterError, FilterExpr};

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store error taxonomy. Engine errors pass through unmodified.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document with id '{0}' already exists")]
    DuplicateDocument(String),

    #[error("ID '{0}' not found, cannot delete it")]
    MissingDocument(String),

    #[error("Metadata key '{key}' on document '{id}' is not a finite number")]
    NonFiniteFloat { id: String, key: String },

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Deserialization failed: {0}")]
    Deserialization(String),

    #[error("Malformed stored row: {0}")]
    MalformedRow(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Conflict-resolution strategy for writing an id that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Engine default; the engine upserts by primary key, so this
    /// behaves like `Overwrite`.
    #[default]
    None,
    /// Raise [`StoreError::DuplicateDocument`] and abort the batch
    Fail,
    /// Leave the existing document untouched
    Skip,
    /// Replace the existing row entirely (no partial metadata patch)
    Overwrite,
}

/// Node table schema. One table, typed map columns for metadata.
const CREATE_TABLE: &str = "CREATE NODE TABLE IF NOT EXISTS documents(\
    id STRING, \
    content STRING, \
    meta_STRING MAP(STRING, STRING), \
    meta_INT MAP(STRING, INT64), \
    meta_FLOAT MAP(STRING, DOUBLE), \
    PRIMARY KEY (id))";

const COUNT: &str = "MATCH (d:documents) RETURN count(d) AS count";

const EXISTS: &str = "MATCH (d:documents) WHERE d.id = $id RETURN d.id";

const INSERT: &str = "CREATE (d:documents {id: $id, content: $content, \
    meta_STRING: $meta_string, meta_INT: $meta_int, meta_FLOAT: $meta_float})";

const DELETE: &str = "MATCH (d:documents) WHERE d.id = $id DELETE d";

const RETURN_ALL_COLUMNS: &str =
    "RETURN d.id, d.content, d.meta_STRING, d.meta_INT, d.meta_FLOAT";

/// Config-map discriminator for [`DocumentStore::to_config`].
pub const CONFIG_TYPE: &str = "graphstore.DocumentStore";

/// A typed-metadata document store over a graph engine.
#[derive(Debug)]
pub struct DocumentStore<E: GraphEngine = MemoryEngine> {
    engine: E,
    db_path: PathBuf,
}

impl DocumentStore<MemoryEngine> {
    /// Opens a store backed by the embedded engine at `db_path`,
    /// creating the document table if missing.
    pub fn open(db_path: impl AsRef<Path>) -> StoreResult<Self> {
        let engine = MemoryEngine::open(db_path.as_ref())?;
        Self::with_engine(engine, db_path.as_ref())
    }

    /// Reconstructs a store from a config map produced by
    /// [`DocumentStore::to_config`].
    pub fn from_config(config: &serde_json::Value) -> StoreResult<Self> {
        let tag = config
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| StoreError::Deserialization("missing 'type' tag".to_string()))?;
        if tag != CONFIG_TYPE {
            return Err(StoreError::Deserialization(format!(
                "unexpected type tag '{tag}'"
            )));
        }

        let db_path = config
            .get("init_parameters")
            .and_then(|p| p.get("db_path"))
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| StoreError::Deserialization("missing 'db_path'".to_string()))?;

        Self::open(db_path)
    }
}

impl<E: GraphEngine> DocumentStore<E> {
    /// Wraps an already-open engine, creating the document table if
    /// missing.
    pub fn with_engine(mut engine: E, db_path: impl AsRef<Path>) -> StoreResult<Self> {
        engine.execute(CREATE_TABLE, Params::new())?;
        Ok(Self {
            engine,
            db_path: db_path.as_ref().to_path_buf(),
        })
    }

    /// Returns the configured database path.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Returns the number of stored documents.
    pub fn count(&mut self) -> StoreResult<u64> {
        let rows = self.engine.execute(COUNT, Params::new())?;
        let count = rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_int)
            .ok_or_else(|| StoreError::MalformedRow("count query returned no count".into()))?;
        Ok(count as u64)
    }

    /// Writes a batch of documents under the given duplicate policy.
    ///
    /// Returns the number of documents actually inserted: skipped
    /// duplicates are excluded, and under [`DuplicatePolicy::Fail`] the
    /// first duplicate aborts the batch (earlier documents stay
    /// committed).
    ///
    /// A NaN or infinite float metadata value aborts the batch before
    /// any engine effect for that document: such a value has no stable
    /// on-disk representation, and persisting it would leave the
    /// snapshot unreadable on reopen.
    pub fn write(&mut self, documents: &[Document], policy: DuplicatePolicy) -> StoreResult<u64> {
        let mut written = 0u64;

        for doc in documents {
            for (key, value) in &doc.meta {
                if matches!(value, MetaValue::Float(f) if !f.is_finite()) {
                    return Err(StoreError::NonFiniteFloat {
                        id: doc.id.clone(),
                        key: key.clone(),
                    });
                }
            }

            if self.exists(&doc.id)? {
                match policy {
                    DuplicatePolicy::Fail => {
                        return Err(StoreError::DuplicateDocument(doc.id.clone()));
                    }
                    DuplicatePolicy::Skip => {
                        debug!(id = %doc.id, "skipping duplicate document");
                        continue;
                    }
                    // Full row replacement; see module docs.
                    DuplicatePolicy::Overwrite | DuplicatePolicy::None => {
                        self.engine.execute(DELETE, id_params(&doc.id))?;
                    }
                }
            }

            let (strings, ints, floats) = codec::encode(&doc.meta);
            let params = Params::from([
                ("id".to_string(), Value::Str(doc.id.clone())),
                ("content".to_string(), Value::Str(doc.content.clone())),
                ("meta_string".to_string(), Value::StrMap(strings)),
                ("meta_int".to_string(), Value::IntMap(ints)),
                ("meta_float".to_string(), Value::FloatMap(floats)),
            ]);
            self.engine.execute(INSERT, params)?;
            debug!(id = %doc.id, "wrote document");
            written += 1;
        }

        Ok(written)
    }

    /// Returns documents matching the filter, or every document when no
    /// filter is given. Order is the engine's return order.
    pub fn filter(&mut self, expr: Option<&FilterExpr>) -> StoreResult<Vec<Document>> {
        let query = match expr {
            None => format!("MATCH (d:documents) {RETURN_ALL_COLUMNS}"),
            Some(expr) => {
                let predicate = filter::compile(expr)?;
                format!("MATCH (d:documents) WHERE {predicate} {RETURN_ALL_COLUMNS}")
            }
        };

        self.query_documents(&query, Params::new())
    }

    /// Executes a query projecting the full column set and decodes each
    /// row into a document. Also the retriever's seam into the engine.
    pub(crate) fn query_documents(
        &mut self,
        query: &str,
        params: Params,
    ) -> StoreResult<Vec<Document>> {
        let rows = self.engine.execute(query, params)?;
        rows.into_iter().map(document_from_row).collect()
    }

    /// Deletes documents by id, existence-checking each one first.
    ///
    /// The first missing id aborts the batch with
    /// [`StoreError::MissingDocument`]; earlier deletions stand.
    pub fn delete(&mut self, ids: &[String]) -> StoreResult<()> {
        for id in ids {
            if !self.exists(id)? {
                return Err(StoreError::MissingDocument(id.clone()));
            }
            self.engine.execute(DELETE, id_params(id))?;
            debug!(id = %id, "deleted document");
        }
        Ok(())
    }

    /// Serializes the store's connection configuration (type tag and
    /// database path). Document contents are not part of the config.
    pub fn to_config(&self) -> serde_json::Value {
        json!({
            "type": CONFIG_TYPE,
            "init_parameters": {
                "db_path": self.db_path,
            },
        })
    }

    fn exists(&mut self, id: &str) -> StoreResult<bool> {
        let rows = self.engine.execute(EXISTS, id_params(id))?;
        Ok(!rows.is_empty())
    }
}

fn id_params(id: &str) -> Params {
    Params::from([("id".to_string(), Value::Str(id.to_string()))])
}

/// Reassembles a [`Document`] from one projected row.
fn document_from_row(row: Row) -> StoreResult<Document> {
    let id = row
        .get("d.id")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::MalformedRow("missing string column d.id".into()))?
        .to_string();
    let content = row
        .get("d.content")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::MalformedRow("missing string column d.content".into()))?
        .to_string();

    let strings = match row.get("d.meta_STRING") {
        Some(Value::StrMap(map)) => map.clone(),
        _ => {
            return Err(StoreError::MalformedRow(
                "missing map column d.meta_STRING".into(),
            ))
        }
    };
    let ints = match row.get("d.meta_INT") {
        Some(Value::IntMap(map)) => map.clone(),
        _ => {
            return Err(StoreError::MalformedRow(
                "missing map column d.meta_INT".into(),
            ))
        }
    };
    let floats = match row.get("d.meta_FLOAT") {
        Some(Value::FloatMap(map)) => map.clone(),
        _ => {
            return Err(StoreError::MalformedRow(
                "missing map column d.meta_FLOAT".into(),
            ))
        }
    };

    Ok(Document {
        id,
        content,
        meta: codec::decode(&strings, &ints, &floats),
    })
}
