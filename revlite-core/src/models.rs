use crate::revision::RevId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A document as seen through the store: the winning revision's properties
/// plus the attachments that revision carries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub rev_id: RevId,
    pub properties: Value,
    pub attachments: Vec<AttachmentMeta>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Get the title from the properties, if present
    pub fn title(&self) -> Option<&str> {
        self.properties.get("title").and_then(|v| v.as_str())
    }

    /// Get the title from the properties, or return a default
    pub fn title_or_default(&self) -> &str {
        self.title().unwrap_or("Untitled")
    }

    pub fn attachment(&self, name: &str) -> Option<&AttachmentMeta> {
        self.attachments.iter().find(|a| a.name == name)
    }
}

/// One immutable node of a document's revision tree.
///
/// `leaf` is true while no child revision exists and the revision has not
/// been superseded by conflict resolution. A document with more than one
/// leaf is conflicted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Revision {
    pub doc_id: Uuid,
    pub rev_id: RevId,
    pub parent: Option<RevId>,
    pub properties: Value,
    pub deleted: bool,
    pub leaf: bool,
    pub committed_at: DateTime<Utc>,
}

/// Metadata for a binary attachment owned by one revision. The bytes live in
/// a content-addressed blob table keyed by `digest`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttachmentMeta {
    pub name: String,
    pub content_type: String,
    pub digest: String,
    pub length: u64,
}

/// The current revision set of a document, as a tagged variant rather than a
/// bare list: either exactly one current revision, or a conflict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum RevisionState {
    /// Exactly one leaf revision (possibly a tombstone).
    Current(Revision),
    /// Two or more leaves, ordered winner-first (see `conflicts::order_leaves`).
    Conflicted(Vec<Revision>),
}

impl RevisionState {
    /// The revision default reads return, if the document is live.
    pub fn winner(&self) -> Option<&Revision> {
        match self {
            RevisionState::Current(rev) => (!rev.deleted).then_some(rev),
            RevisionState::Conflicted(leaves) => leaves.first().filter(|r| !r.deleted),
        }
    }

    pub fn is_conflicted(&self) -> bool {
        matches!(self, RevisionState::Conflicted(_))
    }

    pub fn leaves(&self) -> Vec<&Revision> {
        match self {
            RevisionState::Current(rev) => vec![rev],
            RevisionState::Conflicted(leaves) => leaves.iter().collect(),
        }
    }
}
