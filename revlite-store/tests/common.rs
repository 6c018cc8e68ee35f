use revlite_store::{DocumentStore, StoreConfig};
use serde_json::{json, Value};

/// Opens a fresh in-memory store for one test.
#[allow(dead_code)]
pub async fn setup_store() -> DocumentStore {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    DocumentStore::open(StoreConfig::in_memory()).await.unwrap()
}

#[allow(dead_code)]
pub async fn setup_store_with(config: StoreConfig) -> DocumentStore {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    DocumentStore::open(config).await.unwrap()
}

/// Sample task-like properties.
#[allow(dead_code)]
pub fn task_properties(title: &str) -> Value {
    json!({
        "type": "task",
        "title": title,
        "checked": false
    })
}
