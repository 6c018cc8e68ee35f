//! End-to-end tests for the task helpers: task list round trips, checking,
//! deletion and image attachment through the facade API.

use revlite::tasks;
use revlite::{DocumentStore, StoreConfig, StoreError};
use uuid::Uuid;

async fn setup_store() -> DocumentStore {
    DocumentStore::open(StoreConfig::in_memory())
        .await
        .expect("in-memory store should open")
}

#[tokio::test]
async fn create_and_list_tasks_newest_first() {
    let store = setup_store().await;
    let list_id = Uuid::new_v4();

    let first = tasks::create_task(&store, list_id, "Buy milk", None)
        .await
        .expect("create first task");
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = tasks::create_task(&store, list_id, "Buy eggs", None)
        .await
        .expect("create second task");

    // A task in an unrelated list must not leak into the result.
    tasks::create_task(&store, Uuid::new_v4(), "Other list", None)
        .await
        .expect("create unrelated task");

    let listed = tasks::tasks_in_list(&store, list_id)
        .await
        .expect("list tasks");
    assert_eq!(listed.len(), 2, "only the two tasks in the list are returned");
    assert_eq!(listed[0].id, second.id, "newest task comes first");
    assert_eq!(listed[1].id, first.id);
    assert_eq!(listed[0].title(), Some("Buy eggs"));
}

#[tokio::test]
async fn toggle_checked_flips_the_flag_each_time() {
    let store = setup_store().await;
    let doc = tasks::create_task(&store, Uuid::new_v4(), "Water plants", None)
        .await
        .expect("create task");

    tasks::toggle_checked(&store, doc.id).await.expect("check");
    let checked = store.read(doc.id).await.expect("read checked");
    assert_eq!(
        checked.properties.get("checked").and_then(|v| v.as_bool()),
        Some(true),
        "first toggle marks the task checked"
    );

    tasks::toggle_checked(&store, doc.id).await.expect("uncheck");
    let unchecked = store.read(doc.id).await.expect("read unchecked");
    assert_eq!(
        unchecked.properties.get("checked").and_then(|v| v.as_bool()),
        Some(false),
        "second toggle reverts it"
    );
}

#[tokio::test]
async fn update_title_preserves_other_properties() {
    let store = setup_store().await;
    let list_id = Uuid::new_v4();
    let doc = tasks::create_task(&store, list_id, "Old title", None)
        .await
        .expect("create task");

    tasks::update_title(&store, doc.id, "New title")
        .await
        .expect("rename");

    let renamed = store.read(doc.id).await.expect("read renamed");
    assert_eq!(renamed.title(), Some("New title"));
    assert_eq!(
        renamed.properties.get("list_id").and_then(|v| v.as_str()),
        Some(list_id.to_string().as_str()),
        "list membership survives the rename"
    );
    assert_eq!(
        renamed.properties.get("type").and_then(|v| v.as_str()),
        Some(tasks::TASK_TYPE)
    );
}

#[tokio::test]
async fn deleted_task_disappears_from_its_list() {
    let store = setup_store().await;
    let list_id = Uuid::new_v4();
    let doc = tasks::create_task(&store, list_id, "Temporary", None)
        .await
        .expect("create task");

    tasks::delete_task(&store, doc.id).await.expect("delete");

    let listed = tasks::tasks_in_list(&store, list_id)
        .await
        .expect("list tasks");
    assert!(listed.is_empty(), "deleted task is not listed");
    assert!(
        matches!(store.read(doc.id).await, Err(StoreError::NotFound(_))),
        "reading a deleted task reports NotFound"
    );
}

#[tokio::test]
async fn image_created_with_task_is_readable_back() {
    let store = setup_store().await;
    let bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    let doc = tasks::create_task(&store, Uuid::new_v4(), "Photo task", Some(bytes.clone()))
        .await
        .expect("create task with image");

    let meta = doc
        .attachment(tasks::IMAGE_ATTACHMENT)
        .expect("image attachment is present on the returned document");
    assert_eq!(meta.content_type, "image/jpeg");
    assert_eq!(meta.length, bytes.len() as u64);

    let (read_meta, content) = store
        .read_attachment(doc.id, tasks::IMAGE_ATTACHMENT)
        .await
        .expect("read image back");
    assert_eq!(read_meta.digest, meta.digest);
    assert_eq!(content, bytes);
}

#[tokio::test]
async fn attach_image_later_keeps_the_task_conflict_free() {
    let store = setup_store().await;
    let doc = tasks::create_task(&store, Uuid::new_v4(), "Late photo", None)
        .await
        .expect("create task");

    tasks::attach_image(&store, doc.id, vec![1, 2, 3])
        .await
        .expect("attach image");

    assert!(
        !tasks::has_conflicts(&store, doc.id).await.expect("conflict check"),
        "attaching to the winner does not branch the revision tree"
    );
    let updated = store.read(doc.id).await.expect("read back");
    assert!(updated.attachment(tasks::IMAGE_ATTACHMENT).is_some());
}

#[tokio::test]
async fn concurrent_renames_surface_as_a_conflict() {
    let store = setup_store().await;
    let doc = tasks::create_task(&store, Uuid::new_v4(), "Contested", None)
        .await
        .expect("create task");

    // Two writers race from the same parent revision with different edits;
    // the default policy records the loser as a sibling instead of
    // rejecting it.
    let mut from_phone = doc.properties.clone();
    from_phone["title"] = "Contested (phone)".into();
    let mut from_laptop = doc.properties.clone();
    from_laptop["title"] = "Contested (laptop)".into();

    store
        .update(doc.id, &doc.rev_id, from_phone)
        .await
        .expect("first writer");
    store
        .update(doc.id, &doc.rev_id, from_laptop)
        .await
        .expect("second writer");

    assert!(
        tasks::has_conflicts(&store, doc.id).await.expect("conflict check"),
        "both branches are live, so the task is conflicted"
    );
}
