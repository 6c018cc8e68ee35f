use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use revlite_core::{AttachmentMeta, RevId, Revision, StoreError, StoreResult};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::time::Duration;
use uuid::Uuid;

use crate::queries::Queries;

fn db(err: sqlx::Error) -> StoreError {
    StoreError::unavailable(err)
}

/// SQLite persistence for the revision tree, attachment rows and blobs.
///
/// Write paths run against an explicit connection so the store can wrap a
/// whole operation in one transaction; read paths borrow a pool connection.
pub struct StoreDatabase {
    pub(crate) pool: SqlitePool,
}

impl StoreDatabase {
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        // An in-memory sqlite database exists per connection: the pool must
        // hold exactly one, and that connection must never be reclaimed as
        // idle or the whole store's data vanishes with it.
        let in_memory =
            database_url.contains(":memory:") || database_url.contains("mode=memory");

        let connect = || async {
            let options = if in_memory {
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None::<Duration>)
                    .max_lifetime(None::<Duration>)
            } else {
                SqlitePoolOptions::new().max_connections(max_connections)
            };
            options.connect(database_url).await
        };
        let pool = connect
            .retry(ExponentialBuilder::default())
            .notify(|err: &sqlx::Error, delay| {
                tracing::warn!(
                    "Failed to open store database: {} (retrying in {:?})",
                    err,
                    delay
                );
            })
            .await
            .map_err(db)?;

        sqlx::raw_sql(Queries::SCHEMA).execute(&pool).await.map_err(db)?;
        tracing::debug!("Store database ready at {}", database_url);

        Ok(Self { pool })
    }

    pub(crate) async fn begin(&self) -> StoreResult<Transaction<'static, Sqlite>> {
        self.pool.begin().await.map_err(db)
    }

    pub(crate) async fn acquire(&self) -> StoreResult<PoolConnection<Sqlite>> {
        self.pool.acquire().await.map_err(db)
    }

    fn revision_from_row(row: &SqliteRow) -> StoreResult<Revision> {
        let doc_id: String = row.try_get("doc_id").map_err(db)?;
        let rev_id: String = row.try_get("rev_id").map_err(db)?;
        let parent: Option<String> = row.try_get("parent_rev_id").map_err(db)?;
        let properties: String = row.try_get("properties").map_err(db)?;
        let deleted: bool = row.try_get("deleted").map_err(db)?;
        let leaf: bool = row.try_get("leaf").map_err(db)?;
        let committed_at: String = row.try_get("committed_at").map_err(db)?;

        Ok(Revision {
            doc_id: Uuid::parse_str(&doc_id)?,
            rev_id: rev_id.parse()?,
            parent: parent.map(|p| p.parse()).transpose()?,
            properties: serde_json::from_str(&properties)?,
            deleted,
            leaf,
            committed_at: DateTime::parse_from_rfc3339(&committed_at)?.with_timezone(&Utc),
        })
    }

    fn attachment_from_row(row: &SqliteRow) -> StoreResult<AttachmentMeta> {
        let name: String = row.try_get("name").map_err(db)?;
        let content_type: String = row.try_get("content_type").map_err(db)?;
        let digest: String = row.try_get("digest").map_err(db)?;
        let length: i64 = row.try_get("length").map_err(db)?;

        Ok(AttachmentMeta {
            name,
            content_type,
            digest,
            length: length as u64,
        })
    }

    pub(crate) async fn insert_revision(
        conn: &mut SqliteConnection,
        rev: &Revision,
    ) -> StoreResult<()> {
        let properties = serde_json::to_string(&rev.properties)?;
        sqlx::query(Queries::INSERT_REVISION)
            .bind(rev.doc_id.to_string())
            .bind(rev.rev_id.to_string())
            .bind(rev.parent.as_ref().map(|p| p.to_string()))
            .bind(rev.rev_id.generation() as i64)
            .bind(properties)
            .bind(rev.deleted)
            .bind(rev.committed_at.to_rfc3339())
            .execute(&mut *conn)
            .await
            .map_err(db)?;
        Ok(())
    }

    pub(crate) async fn mark_not_leaf(
        conn: &mut SqliteConnection,
        doc_id: Uuid,
        rev_id: &RevId,
    ) -> StoreResult<()> {
        sqlx::query(Queries::MARK_NOT_LEAF)
            .bind(doc_id.to_string())
            .bind(rev_id.to_string())
            .execute(&mut *conn)
            .await
            .map_err(db)?;
        Ok(())
    }

    pub(crate) async fn leaves(
        conn: &mut SqliteConnection,
        doc_id: Uuid,
    ) -> StoreResult<Vec<Revision>> {
        let rows = sqlx::query(Queries::GET_LEAVES)
            .bind(doc_id.to_string())
            .fetch_all(&mut *conn)
            .await
            .map_err(db)?;
        rows.iter().map(Self::revision_from_row).collect()
    }

    pub(crate) async fn revision(
        conn: &mut SqliteConnection,
        doc_id: Uuid,
        rev_id: &RevId,
    ) -> StoreResult<Option<Revision>> {
        let row = sqlx::query(Queries::GET_REVISION)
            .bind(doc_id.to_string())
            .bind(rev_id.to_string())
            .fetch_optional(&mut *conn)
            .await
            .map_err(db)?;
        row.as_ref().map(Self::revision_from_row).transpose()
    }

    pub(crate) async fn history(
        conn: &mut SqliteConnection,
        doc_id: Uuid,
    ) -> StoreResult<Vec<Revision>> {
        let rows = sqlx::query(Queries::GET_HISTORY)
            .bind(doc_id.to_string())
            .fetch_all(&mut *conn)
            .await
            .map_err(db)?;
        rows.iter().map(Self::revision_from_row).collect()
    }

    pub(crate) async fn all_leaves(conn: &mut SqliteConnection) -> StoreResult<Vec<Revision>> {
        let rows = sqlx::query(Queries::ALL_LEAVES)
            .fetch_all(&mut *conn)
            .await
            .map_err(db)?;
        rows.iter().map(Self::revision_from_row).collect()
    }

    pub(crate) async fn copy_attachments(
        conn: &mut SqliteConnection,
        doc_id: Uuid,
        to: &RevId,
        from: &RevId,
    ) -> StoreResult<()> {
        sqlx::query(Queries::COPY_ATTACHMENTS)
            .bind(doc_id.to_string())
            .bind(to.to_string())
            .bind(from.to_string())
            .execute(&mut *conn)
            .await
            .map_err(db)?;
        Ok(())
    }

    pub(crate) async fn put_attachment(
        conn: &mut SqliteConnection,
        doc_id: Uuid,
        rev_id: &RevId,
        meta: &AttachmentMeta,
    ) -> StoreResult<()> {
        sqlx::query(Queries::PUT_ATTACHMENT)
            .bind(doc_id.to_string())
            .bind(rev_id.to_string())
            .bind(&meta.name)
            .bind(&meta.content_type)
            .bind(&meta.digest)
            .bind(meta.length as i64)
            .execute(&mut *conn)
            .await
            .map_err(db)?;
        Ok(())
    }

    pub(crate) async fn attachments(
        conn: &mut SqliteConnection,
        doc_id: Uuid,
        rev_id: &RevId,
    ) -> StoreResult<Vec<AttachmentMeta>> {
        let rows = sqlx::query(Queries::GET_ATTACHMENTS)
            .bind(doc_id.to_string())
            .bind(rev_id.to_string())
            .fetch_all(&mut *conn)
            .await
            .map_err(db)?;
        rows.iter().map(Self::attachment_from_row).collect()
    }

    pub(crate) async fn put_blob(
        conn: &mut SqliteConnection,
        digest: &str,
        content: &[u8],
    ) -> StoreResult<()> {
        sqlx::query(Queries::PUT_BLOB)
            .bind(digest)
            .bind(content)
            .bind(content.len() as i64)
            .execute(&mut *conn)
            .await
            .map_err(db)?;
        Ok(())
    }

    pub(crate) async fn blob(
        conn: &mut SqliteConnection,
        digest: &str,
    ) -> StoreResult<Option<Vec<u8>>> {
        let row = sqlx::query(Queries::GET_BLOB)
            .bind(digest)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db)?;
        row.map(|r| r.try_get::<Vec<u8>, _>("content").map_err(db))
            .transpose()
    }
}
