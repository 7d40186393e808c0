use sqlx::Row;

use docflow_core::domain::comment::{CommentId, DocumentComment};
use docflow_core::domain::document::DocumentId;

use super::document::parse_timestamp;
use super::{CommentRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCommentRepository {
    pool: DbPool,
}

impl SqlCommentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_comment(row: &sqlx::sqlite::SqliteRow) -> Result<DocumentComment, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let parent_id: Option<String> = row.try_get("parent_id").map_err(decode)?;
    let is_forum_closed: i64 = row.try_get("is_forum_closed").map_err(decode)?;
    let is_system: i64 = row.try_get("is_system").map_err(decode)?;
    let attachments_json: String = row.try_get("attachments").map_err(decode)?;
    let created_at: String = row.try_get("created_at").map_err(decode)?;

    let attachments: Vec<String> = serde_json::from_str(&attachments_json)
        .map_err(|e| RepositoryError::Decode(format!("bad attachments json: {e}")))?;

    Ok(DocumentComment {
        id: CommentId(row.try_get("id").map_err(decode)?),
        document_id: DocumentId(row.try_get("document_id").map_err(decode)?),
        parent_id: parent_id.map(CommentId),
        author_nik: row.try_get("author_nik").map_err(decode)?,
        author_role: row.try_get("author_role").map_err(decode)?,
        body: row.try_get("body").map_err(decode)?,
        is_forum_closed: is_forum_closed != 0,
        is_system: is_system != 0,
        attachments,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait::async_trait]
impl CommentRepository for SqlCommentRepository {
    async fn append(&self, comment: DocumentComment) -> Result<(), RepositoryError> {
        let attachments = serde_json::to_string(&comment.attachments)
            .map_err(|e| RepositoryError::Decode(format!("encode attachments: {e}")))?;

        sqlx::query(
            "INSERT INTO document_comment (id, document_id, parent_id, author_nik, author_role,
                                           body, is_forum_closed, is_system, attachments,
                                           created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&comment.id.0)
        .bind(&comment.document_id.0)
        .bind(comment.parent_id.as_ref().map(|id| id.0.clone()))
        .bind(&comment.author_nik)
        .bind(&comment.author_role)
        .bind(&comment.body)
        .bind(comment.is_forum_closed as i64)
        .bind(comment.is_system as i64)
        .bind(attachments)
        .bind(comment.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<DocumentComment>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, document_id, parent_id, author_nik, author_role, body, is_forum_closed,
                    is_system, attachments, created_at
             FROM document_comment
             WHERE document_id = ?
             ORDER BY created_at ASC, id ASC",
        )
        .bind(&document_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_comment).collect()
    }
}
