use chrono::{DateTime, Utc};
use sqlx::Row;

use docflow_core::domain::document::{DocumentId, DocumentRequest, DocumentStatus, Priority};

use super::{DocumentRepository, RepositoryError};
use crate::DbPool;

pub struct SqlDocumentRepository {
    pool: DbPool,
}

impl SqlDocumentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub fn document_status_as_str(status: DocumentStatus) -> &'static str {
    match status {
        DocumentStatus::Draft => "draft",
        DocumentStatus::Submitted => "submitted",
        DocumentStatus::PendingSupervisor => "pending_supervisor",
        DocumentStatus::PendingGm => "pending_gm",
        DocumentStatus::PendingLegal => "pending_legal",
        DocumentStatus::PendingFinance => "pending_finance",
        DocumentStatus::Discussion => "discussion",
        DocumentStatus::AgreementCreation => "agreement_creation",
        DocumentStatus::Completed => "completed",
        DocumentStatus::Rejected => "rejected",
    }
}

pub fn parse_document_status(s: &str) -> Result<DocumentStatus, RepositoryError> {
    match s {
        "draft" => Ok(DocumentStatus::Draft),
        "submitted" => Ok(DocumentStatus::Submitted),
        "pending_supervisor" => Ok(DocumentStatus::PendingSupervisor),
        "pending_gm" => Ok(DocumentStatus::PendingGm),
        "pending_legal" => Ok(DocumentStatus::PendingLegal),
        "pending_finance" => Ok(DocumentStatus::PendingFinance),
        "discussion" => Ok(DocumentStatus::Discussion),
        "agreement_creation" => Ok(DocumentStatus::AgreementCreation),
        "completed" => Ok(DocumentStatus::Completed),
        "rejected" => Ok(DocumentStatus::Rejected),
        other => Err(RepositoryError::Decode(format!("unknown document status `{other}`"))),
    }
}

fn priority_as_str(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "low",
        Priority::Medium => "medium",
        Priority::High => "high",
    }
}

fn parse_priority(s: &str) -> Result<Priority, RepositoryError> {
    match s {
        "low" => Ok(Priority::Low),
        "medium" => Ok(Priority::Medium),
        "high" => Ok(Priority::High),
        other => Err(RepositoryError::Decode(format!("unknown priority `{other}`"))),
    }
}

pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("bad timestamp `{s}`: {e}")))
}

pub(crate) fn parse_optional_timestamp(
    s: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    s.as_deref().map(parse_timestamp).transpose()
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<DocumentRequest, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let status_str: String = row.try_get("status").map_err(decode)?;
    let priority_str: String = row.try_get("priority").map_err(decode)?;
    let submitted_at: Option<String> = row.try_get("submitted_at").map_err(decode)?;
    let completed_at: Option<String> = row.try_get("completed_at").map_err(decode)?;
    let created_at: String = row.try_get("created_at").map_err(decode)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode)?;

    Ok(DocumentRequest {
        id: DocumentId(row.try_get("id").map_err(decode)?),
        title: row.try_get("title").map_err(decode)?,
        description: row.try_get("description").map_err(decode)?,
        requester_nik: row.try_get("requester_nik").map_err(decode)?,
        supervisor_nik: row.try_get("supervisor_nik").map_err(decode)?,
        division: row.try_get("division").map_err(decode)?,
        directorate: row.try_get("directorate").map_err(decode)?,
        status: parse_document_status(&status_str)?,
        priority: parse_priority(&priority_str)?,
        submitted_at: parse_optional_timestamp(submitted_at)?,
        completed_at: parse_optional_timestamp(completed_at)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

const SELECT_COLUMNS: &str = "id, title, description, requester_nik, supervisor_nik, division,
                              directorate, status, priority, submitted_at, completed_at,
                              created_at, updated_at";

#[async_trait::async_trait]
impl DocumentRepository for SqlDocumentRepository {
    async fn find_by_id(
        &self,
        id: &DocumentId,
    ) -> Result<Option<DocumentRequest>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM document_request WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_document(r)?)),
            None => Ok(None),
        }
    }

    async fn list_by_status(
        &self,
        status: DocumentStatus,
    ) -> Result<Vec<DocumentRequest>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM document_request
             WHERE status = ? ORDER BY created_at ASC"
        ))
        .bind(document_status_as_str(status))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_document).collect()
    }

    async fn save(&self, document: DocumentRequest) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO document_request (id, title, description, requester_nik, supervisor_nik,
                                           division, directorate, status, priority, submitted_at,
                                           completed_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 description = excluded.description,
                 requester_nik = excluded.requester_nik,
                 supervisor_nik = excluded.supervisor_nik,
                 division = excluded.division,
                 directorate = excluded.directorate,
                 status = excluded.status,
                 priority = excluded.priority,
                 submitted_at = excluded.submitted_at,
                 completed_at = excluded.completed_at,
                 updated_at = excluded.updated_at",
        )
        .bind(&document.id.0)
        .bind(&document.title)
        .bind(&document.description)
        .bind(&document.requester_nik)
        .bind(&document.supervisor_nik)
        .bind(&document.division)
        .bind(&document.directorate)
        .bind(document_status_as_str(document.status))
        .bind(priority_as_str(document.priority))
        .bind(document.submitted_at.map(|dt| dt.to_rfc3339()))
        .bind(document.completed_at.map(|dt| dt.to_rfc3339()))
        .bind(document.created_at.to_rfc3339())
        .bind(document.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_transition(
        &self,
        document: DocumentRequest,
        expected: DocumentStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE document_request SET
                 title = ?, description = ?, supervisor_nik = ?, status = ?, priority = ?,
                 submitted_at = ?, completed_at = ?, updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(&document.title)
        .bind(&document.description)
        .bind(&document.supervisor_nik)
        .bind(document_status_as_str(document.status))
        .bind(priority_as_str(document.priority))
        .bind(document.submitted_at.map(|dt| dt.to_rfc3339()))
        .bind(document.completed_at.map(|dt| dt.to_rfc3339()))
        .bind(document.updated_at.to_rfc3339())
        .bind(&document.id.0)
        .bind(document_status_as_str(expected))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict {
                entity: "document_request",
                id: document.id.0,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use docflow_core::domain::document::{DocumentId, DocumentRequest, DocumentStatus, Priority};

    use super::SqlDocumentRepository;
    use crate::repositories::{DocumentRepository, RepositoryError};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_document(id: &str, status: DocumentStatus) -> DocumentRequest {
        let now = Utc::now();
        DocumentRequest {
            id: DocumentId(id.to_string()),
            title: "Vendor NDA".to_string(),
            description: "NDA ahead of the warehouse tender".to_string(),
            requester_nik: "10001".to_string(),
            supervisor_nik: Some("20001".to_string()),
            division: "Logistics".to_string(),
            directorate: "Operations".to_string(),
            status,
            priority: Priority::Medium,
            submitted_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn save_and_find_round_trips_all_fields() {
        let pool = setup().await;
        let repo = SqlDocumentRepository::new(pool);

        let mut document = sample_document("DR-001", DocumentStatus::PendingSupervisor);
        document.submitted_at = Some(Utc::now());
        repo.save(document.clone()).await.expect("save");

        let found = repo
            .find_by_id(&DocumentId("DR-001".to_string()))
            .await
            .expect("find")
            .expect("should exist");

        assert_eq!(found.id, document.id);
        assert_eq!(found.status, DocumentStatus::PendingSupervisor);
        assert_eq!(found.supervisor_nik.as_deref(), Some("20001"));
        assert!(found.submitted_at.is_some());
    }

    #[tokio::test]
    async fn find_missing_returns_none() {
        let pool = setup().await;
        let repo = SqlDocumentRepository::new(pool);
        let found = repo.find_by_id(&DocumentId("DR-404".to_string())).await.expect("find");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn list_by_status_filters() {
        let pool = setup().await;
        let repo = SqlDocumentRepository::new(pool);

        repo.save(sample_document("DR-001", DocumentStatus::Draft)).await.expect("save 1");
        repo.save(sample_document("DR-002", DocumentStatus::PendingGm)).await.expect("save 2");
        repo.save(sample_document("DR-003", DocumentStatus::PendingGm)).await.expect("save 3");

        let pending = repo.list_by_status(DocumentStatus::PendingGm).await.expect("list");
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|d| d.status == DocumentStatus::PendingGm));
    }

    #[tokio::test]
    async fn save_transition_succeeds_when_status_matches() {
        let pool = setup().await;
        let repo = SqlDocumentRepository::new(pool);

        repo.save(sample_document("DR-001", DocumentStatus::PendingSupervisor))
            .await
            .expect("save");

        let mut updated = sample_document("DR-001", DocumentStatus::PendingGm);
        updated.updated_at = Utc::now();
        repo.save_transition(updated, DocumentStatus::PendingSupervisor)
            .await
            .expect("transition");

        let found = repo
            .find_by_id(&DocumentId("DR-001".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(found.status, DocumentStatus::PendingGm);
    }

    #[tokio::test]
    async fn save_transition_conflicts_on_stale_status() {
        let pool = setup().await;
        let repo = SqlDocumentRepository::new(pool);

        // Another writer already moved the document to pending_gm.
        repo.save(sample_document("DR-001", DocumentStatus::PendingGm)).await.expect("save");

        let stale = sample_document("DR-001", DocumentStatus::Rejected);
        let error = repo
            .save_transition(stale, DocumentStatus::PendingSupervisor)
            .await
            .expect_err("stale write must fail");
        assert!(matches!(error, RepositoryError::Conflict { entity: "document_request", .. }));

        let found = repo
            .find_by_id(&DocumentId("DR-001".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(found.status, DocumentStatus::PendingGm);
    }
}
