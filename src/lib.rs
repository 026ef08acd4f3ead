//! graphstore - A typed-metadata document store over a Cypher-style
//! graph engine
//!
//! Documents (id, content, scalar metadata) are persisted in a node table
//! whose metadata lives in three typed map columns, one per scalar type.
//! Filters compile to predicate strings over those columns with
//! type-directed column routing and escaped literals.

pub mod document;
pub mod engine;
pub mod filter;
pub mod retriever;
pub mod store;

pub use document::{Document, MetaValue, Metadata};
pub use filter::{CompareOp, FilterExpr, FilterValue, LogicOp};
pub use store::{DocumentStore, DuplicatePolicy, StoreError};
