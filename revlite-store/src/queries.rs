/// SQL for the revision-tree store.
pub struct Queries;

impl Queries {
    /// Create the store schema.
    ///
    /// Revisions are append-only; `leaf` is the only mutable column and is
    /// cleared when a revision gains a child or loses a conflict resolution.
    /// Attachment bytes are content-addressed in `blobs`; each revision owns
    /// its own rows in `attachments`, copied forward from the parent on
    /// every edit.
    pub const SCHEMA: &'static str = r#"
        CREATE TABLE IF NOT EXISTS revisions (
            doc_id TEXT NOT NULL,
            rev_id TEXT NOT NULL,
            parent_rev_id TEXT,
            generation INTEGER NOT NULL,
            properties JSON NOT NULL,
            deleted INTEGER NOT NULL DEFAULT 0,
            leaf INTEGER NOT NULL DEFAULT 1,
            committed_at TIMESTAMP NOT NULL,
            PRIMARY KEY (doc_id, rev_id)
        );

        CREATE TABLE IF NOT EXISTS attachments (
            doc_id TEXT NOT NULL,
            rev_id TEXT NOT NULL,
            name TEXT NOT NULL,
            content_type TEXT NOT NULL,
            digest TEXT NOT NULL,
            length INTEGER NOT NULL,
            PRIMARY KEY (doc_id, rev_id, name)
        );

        CREATE TABLE IF NOT EXISTS blobs (
            digest TEXT PRIMARY KEY,
            content BLOB NOT NULL,
            length INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_revisions_leaves ON revisions(doc_id, leaf);
        CREATE INDEX IF NOT EXISTS idx_attachments_digest ON attachments(digest);
    "#;

    pub const INSERT_REVISION: &'static str = r#"
        INSERT INTO revisions (
            doc_id, rev_id, parent_rev_id, generation,
            properties, deleted, leaf, committed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)
        ON CONFLICT(doc_id, rev_id) DO NOTHING
    "#;

    pub const MARK_NOT_LEAF: &'static str =
        "UPDATE revisions SET leaf = 0 WHERE doc_id = ?1 AND rev_id = ?2";

    pub const GET_LEAVES: &'static str = r#"
        SELECT doc_id, rev_id, parent_rev_id, properties, deleted, leaf, committed_at
        FROM revisions
        WHERE doc_id = ?1 AND leaf = 1
    "#;

    pub const GET_REVISION: &'static str = r#"
        SELECT doc_id, rev_id, parent_rev_id, properties, deleted, leaf, committed_at
        FROM revisions
        WHERE doc_id = ?1 AND rev_id = ?2
    "#;

    pub const GET_HISTORY: &'static str = r#"
        SELECT doc_id, rev_id, parent_rev_id, properties, deleted, leaf, committed_at
        FROM revisions
        WHERE doc_id = ?1
        ORDER BY generation DESC, rev_id DESC
    "#;

    pub const ALL_LEAVES: &'static str = r#"
        SELECT doc_id, rev_id, parent_rev_id, properties, deleted, leaf, committed_at
        FROM revisions
        WHERE leaf = 1
    "#;

    /// Copy the parent revision's attachment rows onto a new child revision.
    /// Params: ?1 doc id, ?2 child rev id, ?3 parent rev id.
    pub const COPY_ATTACHMENTS: &'static str = r#"
        INSERT OR REPLACE INTO attachments (doc_id, rev_id, name, content_type, digest, length)
        SELECT doc_id, ?2, name, content_type, digest, length
        FROM attachments
        WHERE doc_id = ?1 AND rev_id = ?3
    "#;

    pub const PUT_ATTACHMENT: &'static str = r#"
        INSERT OR REPLACE INTO attachments (doc_id, rev_id, name, content_type, digest, length)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    "#;

    pub const GET_ATTACHMENTS: &'static str = r#"
        SELECT name, content_type, digest, length
        FROM attachments
        WHERE doc_id = ?1 AND rev_id = ?2
        ORDER BY name
    "#;

    pub const PUT_BLOB: &'static str = r#"
        INSERT INTO blobs (digest, content, length)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(digest) DO NOTHING
    "#;

    pub const GET_BLOB: &'static str = "SELECT content FROM blobs WHERE digest = ?1";
}
