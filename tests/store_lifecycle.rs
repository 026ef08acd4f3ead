//! Deletion, counting, metadata ingestion, and config round-trips

use graphstore::document::metadata_from_json;
use graphstore::retriever::ContentRetriever;
use graphstore::{Document, DocumentStore, DuplicatePolicy, StoreError};
use serde_json::json;
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> DocumentStore {
    DocumentStore::open(dir.path().join("store.db")).expect("store opens")
}

// =============================================================================
// Deletion
// =============================================================================

#[test]
fn test_delete_removes_exactly_one_document() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);

    store
        .write(
            &[Document::with_id("1", "test1"), Document::with_id("2", "test2")],
            DuplicatePolicy::None,
        )
        .unwrap();
    assert_eq!(store.count().unwrap(), 2);

    store.delete(&["1".to_string()]).unwrap();
    assert_eq!(store.count().unwrap(), 1);

    let read = store.filter(None).unwrap();
    assert_eq!(read[0].id, "2");
}

#[test]
fn test_deleting_a_missing_id_raises() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);

    store
        .write(&[Document::with_id("1", "once")], DuplicatePolicy::None)
        .unwrap();
    store.delete(&["1".to_string()]).unwrap();

    let err = store.delete(&["1".to_string()]).unwrap_err();
    assert!(
        matches!(&err, StoreError::MissingDocument(id) if id == "1"),
        "second delete must raise MissingDocument, got: {err}"
    );
}

#[test]
fn test_delete_batch_partial_effect() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);

    store
        .write(
            &[Document::with_id("1", "a"), Document::with_id("2", "b")],
            DuplicatePolicy::None,
        )
        .unwrap();

    // "1" is deleted before the missing id aborts the batch; "2" survives.
    let err = store
        .delete(&["1".to_string(), "ghost".to_string(), "2".to_string()])
        .unwrap_err();
    assert!(matches!(&err, StoreError::MissingDocument(id) if id == "ghost"));

    let read = store.filter(None).unwrap();
    assert_eq!(read.len(), 1);
    assert_eq!(read[0].id, "2");
}

// =============================================================================
// Lossy metadata ingestion
// =============================================================================

#[test]
fn test_unsupported_metadata_types_drop_without_raising() {
    let object = json!({
        "type": "article",
        "rating": 4,
        "tags": ["a", "b"],
    });
    let (meta, dropped) = metadata_from_json(object.as_object().unwrap());
    assert_eq!(dropped, vec!["tags".to_string()]);

    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let mut doc = Document::with_id("1", "lossy");
    doc.meta = meta;
    store.write(&[doc], DuplicatePolicy::None).unwrap();

    let read = store.filter(None).unwrap();
    assert_eq!(read[0].meta.len(), 2, "the dropped key is gone, the rest survive");
    assert!(!read[0].meta.contains_key("tags"));
}

#[test]
fn test_non_finite_float_metadata_rejected_before_write() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.db");
    let mut store = DocumentStore::open(&path).unwrap();

    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let err = store
            .write(
                &[Document::with_id("1", "body").with_meta("score", bad)],
                DuplicatePolicy::None,
            )
            .unwrap_err();
        assert!(
            matches!(&err, StoreError::NonFiniteFloat { id, key } if id == "1" && key == "score"),
            "value {bad} must be rejected, got: {err}"
        );
    }
    assert_eq!(store.count().unwrap(), 0);

    // The path stays healthy: later writes persist and reopen cleanly.
    store
        .write(
            &[Document::with_id("2", "kept").with_meta("score", 0.5)],
            DuplicatePolicy::None,
        )
        .unwrap();
    drop(store);

    let mut reopened = DocumentStore::open(&path).unwrap();
    assert_eq!(reopened.count().unwrap(), 1);
    assert_eq!(reopened.filter(None).unwrap()[0].id, "2");
}

// =============================================================================
// Config serialization
// =============================================================================

#[test]
fn test_config_roundtrip_reattaches_by_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.db");

    let config = {
        let mut store = DocumentStore::open(&path).unwrap();
        store
            .write(&[Document::with_id("1", "kept")], DuplicatePolicy::None)
            .unwrap();
        store.to_config()
    };
    assert_eq!(config["type"], "graphstore.DocumentStore");
    assert!(config["init_parameters"]["db_path"].is_string());

    let mut restored = DocumentStore::from_config(&config).unwrap();
    assert_eq!(restored.count().unwrap(), 1);
    assert_eq!(restored.filter(None).unwrap()[0].content, "kept");
}

#[test]
fn test_config_missing_tag_or_path_fails() {
    for config in [
        json!({}),
        json!({"type": "graphstore.DocumentStore"}),
        json!({"type": "wrong.Tag", "init_parameters": {"db_path": "/tmp/x.db"}}),
        json!({"init_parameters": {"db_path": "/tmp/x.db"}}),
    ] {
        let err = DocumentStore::from_config(&config).unwrap_err();
        assert!(
            matches!(err, StoreError::Deserialization(_)),
            "config {config} must fail deserialization, got: {err}"
        );
    }
}

// =============================================================================
// Retrieval
// =============================================================================

#[test]
fn test_retriever_finds_substring_matches() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    store
        .write(
            &[
                Document::with_id("1", "graph storage engines"),
                Document::with_id("2", "relational storage engines"),
                Document::with_id("3", "weather report"),
            ],
            DuplicatePolicy::None,
        )
        .unwrap();

    let retriever = ContentRetriever::new(10).unwrap();
    let hits = retriever.retrieve(&mut store, "storage engines").unwrap();
    assert_eq!(hits.len(), 2);
}
