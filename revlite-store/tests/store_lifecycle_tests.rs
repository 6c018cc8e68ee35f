//! # Store Lifecycle Tests
//!
//! Tests for the core document lifecycle: creation, reads, linear updates
//! with correct parent chaining, and tombstone deletes.
//!
//! Tests cover:
//! - Create/read roundtrips
//! - Single-writer update chains stay linear (no conflicts)
//! - Deletes yield NotFound on read but keep the tombstone in history
//! - Error kinds for missing documents and unknown parents

mod common;

use common::*;
use revlite_core::{RevId, RevisionState, StoreError};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_create_and_read_roundtrip() {
    let store = setup_store().await;

    let doc = store.create(task_properties("Buy milk")).await.unwrap();
    assert_eq!(doc.rev_id.generation(), 1);
    assert!(doc.attachments.is_empty());

    let read = store.read(doc.id).await.unwrap();
    assert_eq!(read.id, doc.id);
    assert_eq!(read.rev_id, doc.rev_id);
    assert_eq!(read.properties, task_properties("Buy milk"));
    assert_eq!(read.title(), Some("Buy milk"));
}

/// Single-threaded updates with correct parent chaining must produce a
/// linear history and never a conflict.
#[tokio::test]
async fn test_chained_updates_stay_linear() {
    let store = setup_store().await;

    let doc = store.create(task_properties("Buy milk")).await.unwrap();
    let rev2 = store
        .update(doc.id, &doc.rev_id, json!({"type": "task", "title": "Buy milk", "checked": true}))
        .await
        .unwrap();
    let rev3 = store
        .update(doc.id, &rev2.rev_id, json!({"type": "task", "title": "Buy oat milk", "checked": true}))
        .await
        .unwrap();

    assert_eq!(rev2.rev_id.generation(), 2);
    assert_eq!(rev3.rev_id.generation(), 3);

    let conflicts = store.list_conflicts(doc.id).await.unwrap();
    assert_eq!(conflicts.len(), 1, "linear history must have a single leaf");
    assert_eq!(conflicts[0].rev_id, rev3.rev_id);

    let history = store.history(doc.id).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].rev_id, rev3.rev_id, "history is newest first");

    match store.read_state(doc.id).await.unwrap() {
        RevisionState::Current(rev) => assert_eq!(rev.rev_id, rev3.rev_id),
        RevisionState::Conflicted(_) => panic!("linear document reported as conflicted"),
    }
}

#[tokio::test]
async fn test_read_missing_document_is_not_found() {
    let store = setup_store().await;
    let id = Uuid::new_v4();

    match store.read(id).await {
        Err(StoreError::NotFound(missing)) => assert_eq!(missing, id),
        other => panic!("expected NotFound, got {:?}", other.map(|d| d.id)),
    }
}

#[tokio::test]
async fn test_update_missing_document_is_not_found() {
    let store = setup_store().await;
    let id = Uuid::new_v4();
    let rev: RevId = "1-00000000000000000000000000000000".parse().unwrap();

    let result = store.update(id, &rev, json!({})).await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

/// An expected parent the store has never seen is not a recordable branch
/// point; the write is rejected in both policy modes.
#[tokio::test]
async fn test_update_with_unknown_parent_is_a_conflict() {
    let store = setup_store().await;
    let doc = store.create(task_properties("Buy milk")).await.unwrap();

    let bogus: RevId = "1-ffffffffffffffffffffffffffffffff".parse().unwrap();
    let result = store.update(doc.id, &bogus, json!({"title": "??"})).await;
    assert!(matches!(result, Err(StoreError::Conflict { .. })));

    // The document itself is untouched.
    let history = store.history(doc.id).await.unwrap();
    assert_eq!(history.len(), 1);
}

/// Delete writes a tombstone: reads fail with NotFound afterwards, but the
/// tombstone revision stays inspectable through history.
#[tokio::test]
async fn test_delete_then_read_is_not_found_but_history_survives() {
    let store = setup_store().await;
    let doc = store.create(task_properties("Buy milk")).await.unwrap();

    store.delete(doc.id, &doc.rev_id).await.unwrap();

    assert!(matches!(
        store.read(doc.id).await,
        Err(StoreError::NotFound(_))
    ));

    let history = store.history(doc.id).await.unwrap();
    assert_eq!(history.len(), 2);
    let tombstone = &history[0];
    assert!(tombstone.deleted);
    assert!(tombstone.leaf);
    assert_eq!(tombstone.rev_id.generation(), 2);
    assert_eq!(tombstone.parent.as_ref(), Some(&doc.rev_id));

    // The tombstone is still the current revision; it just has no winner.
    match store.read_state(doc.id).await.unwrap() {
        RevisionState::Current(rev) => assert!(rev.deleted),
        RevisionState::Conflicted(_) => panic!("tombstoned document reported as conflicted"),
    }
}

#[tokio::test]
async fn test_all_documents_excludes_deleted() {
    let store = setup_store().await;

    let kept = store.create(task_properties("Buy milk")).await.unwrap();
    let dropped = store.create(task_properties("Buy eggs")).await.unwrap();
    store.delete(dropped.id, &dropped.rev_id).await.unwrap();

    let docs = store.all_documents().await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, kept.id);
}
