use std::collections::BTreeSet;

use sqlx::Row;

use docflow_core::discussion::DiscussionState;
use docflow_core::domain::document::DocumentId;

use super::document::parse_optional_timestamp;
use super::{DiscussionRepository, RepositoryError};
use crate::DbPool;

pub struct SqlDiscussionRepository {
    pool: DbPool,
}

impl SqlDiscussionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_state(row: &sqlx::sqlite::SqliteRow) -> Result<DiscussionState, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let open: i64 = row.try_get("open").map_err(decode)?;
    let roles_json: String = row.try_get("participant_roles").map_err(decode)?;
    let closed_at: Option<String> = row.try_get("closed_at").map_err(decode)?;

    let participant_roles: BTreeSet<String> = serde_json::from_str(&roles_json)
        .map_err(|e| RepositoryError::Decode(format!("bad participant roles json: {e}")))?;

    Ok(DiscussionState {
        document_id: DocumentId(row.try_get("document_id").map_err(decode)?),
        open: open != 0,
        participant_roles,
        closed_by: row.try_get("closed_by").map_err(decode)?,
        closed_reason: row.try_get("closed_reason").map_err(decode)?,
        closed_at: parse_optional_timestamp(closed_at)?,
    })
}

#[async_trait::async_trait]
impl DiscussionRepository for SqlDiscussionRepository {
    async fn find_for_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Option<DiscussionState>, RepositoryError> {
        let row = sqlx::query(
            "SELECT document_id, open, participant_roles, closed_by, closed_reason, closed_at
             FROM discussion_state WHERE document_id = ?",
        )
        .bind(&document_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_state(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, state: DiscussionState) -> Result<(), RepositoryError> {
        let roles = serde_json::to_string(&state.participant_roles)
            .map_err(|e| RepositoryError::Decode(format!("encode participant roles: {e}")))?;

        sqlx::query(
            "INSERT INTO discussion_state (document_id, open, participant_roles, closed_by,
                                           closed_reason, closed_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(document_id) DO UPDATE SET
                 open = excluded.open,
                 participant_roles = excluded.participant_roles,
                 closed_by = excluded.closed_by,
                 closed_reason = excluded.closed_reason,
                 closed_at = excluded.closed_at",
        )
        .bind(&state.document_id.0)
        .bind(state.open as i64)
        .bind(roles)
        .bind(&state.closed_by)
        .bind(&state.closed_reason)
        .bind(state.closed_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use docflow_core::discussion::DiscussionState;
    use docflow_core::domain::document::{DocumentId, DocumentRequest, DocumentStatus, Priority};
    use docflow_core::domain::user::Actor;
    use docflow_core::RoleKeywords;

    use super::SqlDiscussionRepository;
    use crate::repositories::{DiscussionRepository, DocumentRepository, SqlDocumentRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    async fn insert_document(pool: &sqlx::SqlitePool, id: &str) {
        let now = Utc::now();
        let repo = SqlDocumentRepository::new(pool.clone());
        repo.save(DocumentRequest {
            id: DocumentId(id.to_string()),
            title: "Vendor NDA".to_string(),
            description: "NDA ahead of the warehouse tender".to_string(),
            requester_nik: "10001".to_string(),
            supervisor_nik: Some("20001".to_string()),
            division: "Logistics".to_string(),
            directorate: "Operations".to_string(),
            status: DocumentStatus::Discussion,
            priority: Priority::Medium,
            submitted_at: Some(now),
            completed_at: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .expect("insert parent document");
    }

    #[tokio::test]
    async fn open_state_round_trips_participants() {
        let pool = setup().await;
        insert_document(&pool, "DR-001").await;

        let repo = SqlDiscussionRepository::new(pool);
        let mut state = DiscussionState::open(DocumentId("DR-001".to_string()));
        state.record_participant("Finance Analyst");
        state.record_participant("Legal Officer");

        repo.save(state.clone()).await.expect("save");
        let found = repo
            .find_for_document(&DocumentId("DR-001".to_string()))
            .await
            .expect("find")
            .expect("exists");

        assert!(found.open);
        assert_eq!(found.participant_roles, state.participant_roles);
    }

    #[tokio::test]
    async fn closed_state_upserts_over_open_state() {
        let pool = setup().await;
        insert_document(&pool, "DR-001").await;

        let repo = SqlDiscussionRepository::new(pool);
        let mut state = DiscussionState::open(DocumentId("DR-001".to_string()));
        state.record_participant("Finance Analyst");
        repo.save(state.clone()).await.expect("save open");

        let head_legal = Actor::new("40001", "Nina", "Head Legal", "Legal", "Corporate");
        state
            .close(&head_legal, "all positions reconciled", &RoleKeywords::default())
            .expect("close");
        repo.save(state).await.expect("save closed");

        let found = repo
            .find_for_document(&DocumentId("DR-001".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert!(!found.open);
        assert_eq!(found.closed_by.as_deref(), Some("40001"));
        assert!(found.closed_at.is_some());
    }

    #[tokio::test]
    async fn missing_state_returns_none() {
        let pool = setup().await;
        let repo = SqlDiscussionRepository::new(pool);
        let found = repo
            .find_for_document(&DocumentId("DR-404".to_string()))
            .await
            .expect("find");
        assert!(found.is_none());
    }
}
