//! Content retriever
//!
//! A thin wrapper over [`DocumentStore`] that answers a text query with
//! the documents whose content contains it as a substring, capped at
//! `top_k`. No ranking; results arrive in the engine's return order.

use thiserror::Error;

use crate::document::Document;
use crate::engine::{GraphEngine, Params, Value};
use crate::store::{DocumentStore, StoreResult};

/// Retriever construction errors
#[derive(Debug, Error, PartialEq)]
pub enum RetrieverError {
    #[error("top_k must be greater than zero, got {0}")]
    InvalidTopK(usize),
}

const SEARCH: &str = "MATCH (d:documents) WHERE d.content CONTAINS $query \
    RETURN d.id, d.content, d.meta_STRING, d.meta_INT, d.meta_FLOAT";

/// Retrieves documents by content substring match.
#[derive(Debug)]
pub struct ContentRetriever {
    top_k: usize,
}

impl ContentRetriever {
    /// Creates a retriever returning at most `top_k` documents per query.
    pub fn new(top_k: usize) -> Result<Self, RetrieverError> {
        if top_k == 0 {
            return Err(RetrieverError::InvalidTopK(top_k));
        }
        Ok(Self { top_k })
    }

    /// Runs the substring query against the store.
    pub fn retrieve<E: GraphEngine>(
        &self,
        store: &mut DocumentStore<E>,
        query: &str,
    ) -> StoreResult<Vec<Document>> {
        let statement = format!("{SEARCH} LIMIT {}", self.top_k);
        let params = Params::from([("query".to_string(), Value::Str(query.to_string()))]);
        store.query_documents(&statement, params)
    }
}
