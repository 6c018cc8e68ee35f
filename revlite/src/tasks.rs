//! Task helpers layered over the document store.
//!
//! A task is a plain document with a `type` of `"task"`, a `list_id` pointing
//! at its parent list, a `title`, a `checked` flag and `created_at`/`updated_at`
//! timestamps. An optional image rides along as the `"image"` attachment.

use chrono::Utc;
use revlite_core::models::{Document, Revision};
use revlite_core::revision::RevId;
use revlite_core::StoreResult;
use revlite_store::DocumentStore;
use serde_json::{json, Map, Value};
use uuid::Uuid;

/// `type` property stamped on every task document.
pub const TASK_TYPE: &str = "task";
/// Attachment name used for a task's image.
pub const IMAGE_ATTACHMENT: &str = "image";
const IMAGE_CONTENT_TYPE: &str = "image/jpeg";

/// Create a new task document, optionally with an image attached.
///
/// Returns the created document as the store now sees it.
pub async fn create_task(
    store: &DocumentStore,
    list_id: Uuid,
    title: &str,
    image: Option<Vec<u8>>,
) -> StoreResult<Document> {
    let now = Utc::now().to_rfc3339();
    let properties = json!({
        "type": TASK_TYPE,
        "list_id": list_id,
        "title": title,
        "checked": false,
        "created_at": now,
        "updated_at": now,
    });
    let doc = store.create(properties).await?;
    tracing::debug!("Created task {} in list {}", doc.id, list_id);
    if let Some(bytes) = image {
        store
            .attach(doc.id, Some(&doc.rev_id), IMAGE_ATTACHMENT, bytes, IMAGE_CONTENT_TYPE)
            .await?;
        return store.read(doc.id).await;
    }
    Ok(doc)
}

/// Rename a task, writing a child of its current winning revision.
pub async fn update_title(store: &DocumentStore, id: Uuid, title: &str) -> StoreResult<Revision> {
    let doc = store.read(id).await?;
    let properties = patched(&doc, |props| {
        props.insert("title".to_string(), Value::String(title.to_string()));
    });
    store.update(id, &doc.rev_id, properties).await
}

/// Flip the task's `checked` flag.
pub async fn toggle_checked(store: &DocumentStore, id: Uuid) -> StoreResult<Revision> {
    let doc = store.read(id).await?;
    let checked = doc
        .properties
        .get("checked")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let properties = patched(&doc, |props| {
        props.insert("checked".to_string(), Value::Bool(!checked));
    });
    store.update(id, &doc.rev_id, properties).await
}

/// Tombstone a task at its current winning revision.
pub async fn delete_task(store: &DocumentStore, id: Uuid) -> StoreResult<()> {
    let doc = store.read(id).await?;
    store.delete(id, &doc.rev_id).await
}

/// Attach (or replace) the task's image on its current winning revision.
pub async fn attach_image(store: &DocumentStore, id: Uuid, bytes: Vec<u8>) -> StoreResult<Revision> {
    store
        .attach(id, None, IMAGE_ATTACHMENT, bytes, IMAGE_CONTENT_TYPE)
        .await
}

/// Attach an arbitrary named blob to a task's current winning revision.
pub async fn attach_named(
    store: &DocumentStore,
    id: Uuid,
    rev: &RevId,
    name: &str,
    bytes: Vec<u8>,
    content_type: &str,
) -> StoreResult<Revision> {
    store.attach(id, Some(rev), name, bytes, content_type).await
}

/// All live tasks belonging to `list_id`, newest first by `created_at`.
pub async fn tasks_in_list(store: &DocumentStore, list_id: Uuid) -> StoreResult<Vec<Document>> {
    let list_key = list_id.to_string();
    let mut tasks: Vec<Document> = store
        .all_documents()
        .await?
        .into_iter()
        .filter(|doc| {
            doc.properties.get("type").and_then(Value::as_str) == Some(TASK_TYPE)
                && doc.properties.get("list_id").and_then(Value::as_str) == Some(list_key.as_str())
        })
        .collect();
    tasks.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    Ok(tasks)
}

/// Whether the task currently has more than one live revision branch.
pub async fn has_conflicts(store: &DocumentStore, id: Uuid) -> StoreResult<bool> {
    Ok(store.list_conflicts(id).await?.len() > 1)
}

fn created_at(doc: &Document) -> String {
    doc.properties
        .get("created_at")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Clone a document's properties, apply `patch` and refresh `updated_at`.
fn patched(doc: &Document, patch: impl FnOnce(&mut Map<String, Value>)) -> Value {
    let mut props = match &doc.properties {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    patch(&mut props);
    props.insert(
        "updated_at".to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );
    Value::Object(props)
}
