use chrono::Utc;
use dashmap::DashMap;
use revlite_core::{
    conflicts, AttachmentMeta, ConflictPolicy, Document, RevId, Revision, RevisionState,
    StoreError, StoreResult,
};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::database::StoreDatabase;
use crate::notifier::{ChangeNotifier, DocumentChange};

/// Conflict-aware document store over a revision-tracked SQLite database.
///
/// Writes to one document are serialized through a per-id lock stripe and
/// committed in a single transaction; concurrent writers to the same
/// document either chain linearly or branch into recorded siblings, never
/// lose each other's data. Reads take a pool connection and see either the
/// pre- or post-commit state of an in-flight write, never a torn one.
pub struct DocumentStore {
    db: StoreDatabase,
    notifier: Arc<ChangeNotifier>,
    policy: ConflictPolicy,
    write_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

/// Holds one document's write lock. On drop the map entry is evicted unless
/// another writer already holds a reference to it, so the lock table stays
/// proportional to the number of in-flight writes, not documents ever seen.
struct DocWriteGuard<'a> {
    locks: &'a DashMap<Uuid, Arc<Mutex<()>>>,
    id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for DocWriteGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl DocumentStore {
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        let db = StoreDatabase::connect(&config.database_url, config.max_connections).await?;
        tracing::info!(
            "Opened document store ({} conflict policy)",
            config.conflict_policy
        );
        Ok(Self {
            db,
            notifier: Arc::new(ChangeNotifier::new()),
            policy: config.conflict_policy,
            write_locks: DashMap::new(),
        })
    }

    pub fn notifier(&self) -> Arc<ChangeNotifier> {
        self.notifier.clone()
    }

    pub fn conflict_policy(&self) -> ConflictPolicy {
        self.policy
    }

    async fn lock_doc(&self, id: Uuid) -> DocWriteGuard<'_> {
        let lock = self
            .write_locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        DocWriteGuard {
            locks: &self.write_locks,
            id,
            guard: Some(lock.lock_owned().await),
        }
    }

    fn publish(&self, rev: &Revision, external: bool) {
        self.notifier.publish(DocumentChange {
            document_id: rev.doc_id,
            rev_id: rev.rev_id.clone(),
            deleted: rev.deleted,
            external,
        });
    }

    /// Create a new document with an initial revision.
    pub async fn create(&self, properties: Value) -> StoreResult<Document> {
        let id = Uuid::new_v4();
        let _guard = self.lock_doc(id).await;

        let rev = Revision {
            doc_id: id,
            rev_id: RevId::derive(None, &properties, false),
            parent: None,
            properties,
            deleted: false,
            leaf: true,
            committed_at: Utc::now(),
        };

        let mut tx = self.db.begin().await?;
        StoreDatabase::insert_revision(&mut tx, &rev).await?;
        tx.commit().await.map_err(StoreError::unavailable)?;

        tracing::info!("Created document {} at {}", id, rev.rev_id);
        self.publish(&rev, false);

        Ok(Document {
            id,
            rev_id: rev.rev_id,
            properties: rev.properties,
            attachments: Vec::new(),
            updated_at: rev.committed_at,
        })
    }

    /// Read the winning revision of a live document.
    pub async fn read(&self, id: Uuid) -> StoreResult<Document> {
        let mut conn = self.db.acquire().await?;
        let leaves = StoreDatabase::leaves(&mut conn, id).await?;
        if leaves.is_empty() {
            return Err(StoreError::NotFound(id));
        }

        let ordered = conflicts::order_leaves(leaves);
        let winner = conflicts::select_winner(&ordered).ok_or(StoreError::NotFound(id))?;
        let attachments = StoreDatabase::attachments(&mut conn, id, &winner.rev_id).await?;

        Ok(Document {
            id,
            rev_id: winner.rev_id.clone(),
            properties: winner.properties.clone(),
            attachments,
            updated_at: winner.committed_at,
        })
    }

    /// The document's current revision set as a tagged variant.
    pub async fn read_state(&self, id: Uuid) -> StoreResult<RevisionState> {
        let mut conn = self.db.acquire().await?;
        let leaves = StoreDatabase::leaves(&mut conn, id).await?;
        let mut ordered = conflicts::order_leaves(leaves);
        match ordered.len() {
            0 => Err(StoreError::NotFound(id)),
            1 => Ok(RevisionState::Current(ordered.remove(0))),
            _ => Ok(RevisionState::Conflicted(ordered)),
        }
    }

    /// Write a new revision with `expected_parent` as its parent.
    ///
    /// If the parent is still current the history stays linear. If another
    /// writer got there first, behavior follows the configured policy:
    /// record a sibling (and a conflict), or fail with `Conflict`. Since ids
    /// are content-derived, re-sending an identical edit returns the
    /// already-committed revision and changes nothing.
    pub async fn update(
        &self,
        id: Uuid,
        expected_parent: &RevId,
        properties: Value,
    ) -> StoreResult<Revision> {
        self.write_child(id, expected_parent, properties, false).await
    }

    /// Write a tombstone revision. Same conflict rules as `update`.
    pub async fn delete(&self, id: Uuid, expected_parent: &RevId) -> StoreResult<()> {
        self.write_child(id, expected_parent, Value::Object(Default::default()), true)
            .await?;
        Ok(())
    }

    async fn write_child(
        &self,
        id: Uuid,
        expected_parent: &RevId,
        properties: Value,
        deleted: bool,
    ) -> StoreResult<Revision> {
        let _guard = self.lock_doc(id).await;

        let mut tx = self.db.begin().await?;
        let leaves = StoreDatabase::leaves(&mut tx, id).await?;
        if leaves.is_empty() {
            return Err(StoreError::NotFound(id));
        }

        // Revision ids are content-derived, so the same edit from the same
        // parent hashes to the same id. A re-send of an already-committed
        // revision is a no-op, never a new sibling or a second event.
        let rev_id = RevId::derive(Some(expected_parent), &properties, deleted);
        if let Some(existing) = StoreDatabase::revision(&mut tx, id, &rev_id).await? {
            tracing::debug!("Revision {} for document {} already committed", rev_id, id);
            return Ok(existing);
        }

        let parent_is_current = leaves.iter().any(|l| l.rev_id == *expected_parent);
        if !parent_is_current {
            // A sibling must branch from a revision this store has seen;
            // an unknown parent is rejected in both policy modes.
            let known = StoreDatabase::revision(&mut tx, id, expected_parent).await?;
            if known.is_none() || self.policy == ConflictPolicy::FailOnConflict {
                return Err(StoreError::Conflict {
                    document_id: id,
                    expected: expected_parent.clone(),
                });
            }
        }

        let rev = Revision {
            doc_id: id,
            rev_id,
            parent: Some(expected_parent.clone()),
            properties,
            deleted,
            leaf: true,
            committed_at: Utc::now(),
        };

        StoreDatabase::insert_revision(&mut tx, &rev).await?;
        StoreDatabase::mark_not_leaf(&mut tx, id, expected_parent).await?;
        if !deleted {
            StoreDatabase::copy_attachments(&mut tx, id, &rev.rev_id, expected_parent).await?;
        }
        tx.commit().await.map_err(StoreError::unavailable)?;

        if parent_is_current {
            tracing::info!(
                "Committed {} on document {} (parent {})",
                rev.rev_id,
                id,
                expected_parent
            );
        } else {
            tracing::warn!(
                "Document {} is now conflicted: sibling {} branched from stale parent {}",
                id,
                rev.rev_id,
                expected_parent
            );
        }
        self.publish(&rev, false);
        Ok(rev)
    }

    /// Attach binary content to the current winning revision, or to `rev` if
    /// the caller holds one. Fails with `Conflict` if that revision is no
    /// longer current; the caller re-reads and retries.
    pub async fn attach(
        &self,
        id: Uuid,
        rev: Option<&RevId>,
        name: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> StoreResult<Revision> {
        if name.is_empty() {
            return Err(StoreError::InvalidAttachment {
                name: name.to_string(),
                reason: "attachment name is empty".to_string(),
            });
        }
        if content_type.is_empty() || !content_type.contains('/') {
            return Err(StoreError::InvalidAttachment {
                name: name.to_string(),
                reason: format!("malformed content type '{content_type}'"),
            });
        }

        let _guard = self.lock_doc(id).await;

        let mut tx = self.db.begin().await?;
        let leaves = StoreDatabase::leaves(&mut tx, id).await?;
        if leaves.is_empty() {
            return Err(StoreError::NotFound(id));
        }
        let ordered = conflicts::order_leaves(leaves);

        let base = match rev {
            Some(rev_id) => {
                ordered
                    .iter()
                    .find(|l| l.rev_id == *rev_id)
                    .ok_or_else(|| StoreError::Conflict {
                        document_id: id,
                        expected: rev_id.clone(),
                    })?
            }
            None => conflicts::select_winner(&ordered).ok_or(StoreError::NotFound(id))?,
        };

        let digest = hex::encode(Sha256::digest(&content));
        let meta = AttachmentMeta {
            name: name.to_string(),
            content_type: content_type.to_string(),
            digest: digest.clone(),
            length: content.len() as u64,
        };

        let tag = format!("{name}:{digest}");
        let new_rev = Revision {
            doc_id: id,
            rev_id: RevId::derive_tagged(Some(&base.rev_id), &base.properties, false, tag.as_bytes()),
            parent: Some(base.rev_id.clone()),
            properties: base.properties.clone(),
            deleted: false,
            leaf: true,
            committed_at: Utc::now(),
        };

        StoreDatabase::insert_revision(&mut tx, &new_rev).await?;
        StoreDatabase::mark_not_leaf(&mut tx, id, &base.rev_id).await?;
        StoreDatabase::copy_attachments(&mut tx, id, &new_rev.rev_id, &base.rev_id).await?;
        StoreDatabase::put_blob(&mut tx, &digest, &content).await?;
        StoreDatabase::put_attachment(&mut tx, id, &new_rev.rev_id, &meta).await?;
        tx.commit().await.map_err(StoreError::unavailable)?;

        tracing::info!(
            "Attached '{}' ({} bytes) to document {} at {}",
            name,
            meta.length,
            id,
            new_rev.rev_id
        );
        self.publish(&new_rev, false);
        Ok(new_rev)
    }

    /// Bytes and metadata of a named attachment on the winning revision.
    pub async fn read_attachment(
        &self,
        id: Uuid,
        name: &str,
    ) -> StoreResult<(AttachmentMeta, Vec<u8>)> {
        let doc = self.read(id).await?;
        let meta = doc
            .attachment(name)
            .cloned()
            .ok_or_else(|| StoreError::InvalidAttachment {
                name: name.to_string(),
                reason: "not present on the winning revision".to_string(),
            })?;

        let mut conn = self.db.acquire().await?;
        let content = StoreDatabase::blob(&mut conn, &meta.digest)
            .await?
            .ok_or_else(|| {
                StoreError::unavailable(format!(
                    "missing blob {} for attachment '{}'",
                    meta.digest, name
                ))
            })?;
        Ok((meta, content))
    }

    /// All current leaf revisions, winner first. Zero or one element means
    /// the document is not conflicted.
    pub async fn list_conflicts(&self, id: Uuid) -> StoreResult<Vec<Revision>> {
        let mut conn = self.db.acquire().await?;
        let leaves = StoreDatabase::leaves(&mut conn, id).await?;
        Ok(conflicts::order_leaves(leaves))
    }

    /// Pick `winning` among the current leaves; all other leaves are marked
    /// superseded (still retrievable through `history`). With
    /// `merged_properties`, a merge revision is committed as a child of the
    /// winner and becomes the sole current revision.
    pub async fn resolve(
        &self,
        id: Uuid,
        winning: &RevId,
        merged_properties: Option<Value>,
    ) -> StoreResult<Revision> {
        let _guard = self.lock_doc(id).await;

        let mut tx = self.db.begin().await?;
        let leaves = StoreDatabase::leaves(&mut tx, id).await?;
        if leaves.is_empty() {
            return Err(StoreError::NotFound(id));
        }

        let winner = leaves
            .iter()
            .find(|l| l.rev_id == *winning)
            .cloned()
            .ok_or_else(|| StoreError::Conflict {
                document_id: id,
                expected: winning.clone(),
            })?;

        for leaf in leaves.iter().filter(|l| l.rev_id != *winning) {
            StoreDatabase::mark_not_leaf(&mut tx, id, &leaf.rev_id).await?;
            tracing::debug!("Superseded losing revision {} on document {}", leaf.rev_id, id);
        }

        let resolved = match merged_properties {
            Some(properties) => {
                let merged = Revision {
                    doc_id: id,
                    rev_id: RevId::derive(Some(winning), &properties, false),
                    parent: Some(winning.clone()),
                    properties,
                    deleted: false,
                    leaf: true,
                    committed_at: Utc::now(),
                };
                StoreDatabase::insert_revision(&mut tx, &merged).await?;
                StoreDatabase::mark_not_leaf(&mut tx, id, winning).await?;
                StoreDatabase::copy_attachments(&mut tx, id, &merged.rev_id, winning).await?;
                merged
            }
            None => winner,
        };

        tx.commit().await.map_err(StoreError::unavailable)?;
        tracing::info!("Resolved conflict on document {}: {} wins", id, resolved.rev_id);
        self.publish(&resolved, false);
        Ok(resolved)
    }

    /// Every revision ever written for the document, newest first.
    /// Tombstones and superseded revisions included.
    pub async fn history(&self, id: Uuid) -> StoreResult<Vec<Revision>> {
        let mut conn = self.db.acquire().await?;
        let history = StoreDatabase::history(&mut conn, id).await?;
        if history.is_empty() {
            return Err(StoreError::NotFound(id));
        }
        Ok(history)
    }

    /// Insert a revision exactly as received from a replicator or another
    /// writer: the id is taken as given, no new id is derived, and the
    /// change event is delivered with `external = true`. Redelivery of an
    /// already-known revision is a no-op.
    pub async fn ingest_revision(
        &self,
        id: Uuid,
        rev_id: RevId,
        parent: Option<RevId>,
        properties: Value,
        deleted: bool,
    ) -> StoreResult<Revision> {
        let _guard = self.lock_doc(id).await;

        let mut tx = self.db.begin().await?;
        if let Some(existing) = StoreDatabase::revision(&mut tx, id, &rev_id).await? {
            tracing::debug!("Revision {} for document {} already known", rev_id, id);
            return Ok(existing);
        }

        let rev = Revision {
            doc_id: id,
            rev_id,
            parent,
            properties,
            deleted,
            leaf: true,
            committed_at: Utc::now(),
        };

        StoreDatabase::insert_revision(&mut tx, &rev).await?;
        if let Some(parent) = &rev.parent {
            StoreDatabase::mark_not_leaf(&mut tx, id, parent).await?;
        }
        let leaves = StoreDatabase::leaves(&mut tx, id).await?;
        tx.commit().await.map_err(StoreError::unavailable)?;

        if leaves.len() > 1 {
            tracing::warn!(
                "External revision {} left document {} conflicted ({} leaves)",
                rev.rev_id,
                id,
                leaves.len()
            );
        } else {
            tracing::info!("Ingested external revision {} for document {}", rev.rev_id, id);
        }
        self.publish(&rev, true);
        Ok(rev)
    }

    /// All live documents at their winning revisions, most recently updated
    /// first.
    pub async fn all_documents(&self) -> StoreResult<Vec<Document>> {
        let mut conn = self.db.acquire().await?;
        let leaves = StoreDatabase::all_leaves(&mut conn).await?;

        let mut by_doc: HashMap<Uuid, Vec<Revision>> = HashMap::new();
        for leaf in leaves {
            by_doc.entry(leaf.doc_id).or_default().push(leaf);
        }

        let mut documents = Vec::new();
        for (id, doc_leaves) in by_doc {
            let ordered = conflicts::order_leaves(doc_leaves);
            let Some(winner) = conflicts::select_winner(&ordered) else {
                continue;
            };
            let attachments = StoreDatabase::attachments(&mut conn, id, &winner.rev_id).await?;
            documents.push(Document {
                id,
                rev_id: winner.rev_id.clone(),
                properties: winner.properties.clone(),
                attachments,
                updated_at: winner.committed_at,
            });
        }
        documents.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(documents)
    }
}
