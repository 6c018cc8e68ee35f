//! Revlite - Conflict-aware revisioned document store
//!
//! This crate provides a unified API for the Revlite document store.
//!
//! # Example
//!
//! ```ignore
//! use revlite::{DocumentStore, StoreConfig};
//!
//! let store = DocumentStore::open(StoreConfig::in_memory()).await?;
//! let doc = store.create(json!({"title": "Buy milk"})).await?;
//! ```

pub mod tasks;

// Re-export store types
pub use revlite_store::{ChangeNotifier, DocumentChange, DocumentStore, StoreConfig, Subscription};

// Re-export core types that external applications may need
pub use revlite_core::conflicts::ConflictPolicy;
pub use revlite_core::errors::StoreError;
pub use revlite_core::models::{AttachmentMeta, Document, Revision, RevisionState};
pub use revlite_core::revision::RevId;
pub use revlite_core::StoreResult;
