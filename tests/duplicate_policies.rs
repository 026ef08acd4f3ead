//! Duplicate-policy behavior of the document store
//!
//! Per-document write state machine:
//! - ABSENT  + write (any policy)     -> PRESENT
//! - PRESENT + write (FAIL)           -> DuplicateDocument, batch aborts
//! - PRESENT + write (SKIP)           -> unchanged, not counted
//! - PRESENT + write (OVERWRITE/NONE) -> replaced
//!
//! Batches are sequential, not transactional.

use graphstore::{Document, DocumentStore, DuplicatePolicy, StoreError};
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> DocumentStore {
    DocumentStore::open(dir.path().join("store.db")).expect("store opens")
}

// =============================================================================
// Writing and reading back
// =============================================================================

#[test]
fn test_write_and_read_documents() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);

    let docs = vec![
        Document::with_id("1", "test1").with_meta("key1", "value1"),
        Document::with_id("2", "test2").with_meta("key2", "value2"),
    ];
    assert_eq!(store.write(&docs, DuplicatePolicy::None).unwrap(), 2);
    assert_eq!(store.count().unwrap(), 2);

    let read = store.filter(None).unwrap();
    assert_eq!(read.len(), 2);
    assert!(read.iter().any(|d| d.content == "test1"));
    assert!(read.iter().any(|d| d.content == "test2"));
}

#[test]
fn test_no_filter_read_includes_empty_metadata_documents() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);

    store
        .write(
            &[
                Document::with_id("1", "meta").with_meta("type", "article"),
                Document::with_id("2", "no meta"),
            ],
            DuplicatePolicy::None,
        )
        .unwrap();

    let read = store.filter(None).unwrap();
    assert_eq!(read.len(), 2, "every stored document is returned once");
}

// =============================================================================
// Duplicate policies
// =============================================================================

#[test]
fn test_duplicate_policy_literal_scenario() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);

    let doc = Document::with_id("1", "test");
    assert_eq!(store.write(&[doc.clone()], DuplicatePolicy::None).unwrap(), 1);

    // FAIL raises on the existing id.
    let err = store.write(&[doc.clone()], DuplicatePolicy::Fail).unwrap_err();
    assert!(
        matches!(&err, StoreError::DuplicateDocument(id) if id == "1"),
        "expected DuplicateDocument, got: {err}"
    );

    // SKIP is counted as not applied and leaves content unchanged.
    assert_eq!(store.write(&[doc], DuplicatePolicy::Skip).unwrap(), 0);
    assert_eq!(store.filter(None).unwrap()[0].content, "test");

    // OVERWRITE replaces the row.
    let updated = Document::with_id("1", "updated");
    assert_eq!(store.write(&[updated], DuplicatePolicy::Overwrite).unwrap(), 1);
    let read = store.filter(None).unwrap();
    assert_eq!(read.len(), 1);
    assert_eq!(read[0].content, "updated");
}

#[test]
fn test_overwrite_replaces_whole_row_not_a_patch() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);

    store
        .write(
            &[Document::with_id("1", "v1")
                .with_meta("type", "article")
                .with_meta("rating", 4)],
            DuplicatePolicy::None,
        )
        .unwrap();
    store
        .write(
            &[Document::with_id("1", "v2").with_meta("type", "blog")],
            DuplicatePolicy::Overwrite,
        )
        .unwrap();

    let read = store.filter(None).unwrap();
    assert_eq!(read[0].content, "v2");
    assert!(
        !read[0].meta.contains_key("rating"),
        "overwrite must not keep old metadata keys"
    );
}

#[test]
fn test_fail_policy_batch_partial_effect() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);

    store
        .write(&[Document::with_id("dup", "old")], DuplicatePolicy::None)
        .unwrap();

    // docA is new and lands before the duplicate aborts the batch.
    let batch = vec![
        Document::with_id("new", "fresh"),
        Document::with_id("dup", "conflicting"),
    ];
    let err = store.write(&batch, DuplicatePolicy::Fail).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateDocument(_)));

    assert_eq!(
        store.count().unwrap(),
        2,
        "the document before the duplicate stays committed"
    );
    let read = store.filter(None).unwrap();
    let dup = read.iter().find(|d| d.id == "dup").unwrap();
    assert_eq!(dup.content, "old", "FAIL must not modify the existing row");
}

#[test]
fn test_skip_only_counts_new_documents() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);

    store
        .write(&[Document::with_id("1", "kept")], DuplicatePolicy::None)
        .unwrap();

    let batch = vec![
        Document::with_id("1", "ignored"),
        Document::with_id("2", "new"),
    ];
    assert_eq!(store.write(&batch, DuplicatePolicy::Skip).unwrap(), 1);
    assert_eq!(store.count().unwrap(), 2);
}
