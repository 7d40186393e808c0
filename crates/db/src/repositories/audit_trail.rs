use std::collections::BTreeMap;

use sqlx::Row;

use docflow_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
use docflow_core::domain::agreement::AgreementId;
use docflow_core::domain::document::DocumentId;
use docflow_core::domain::WorkflowRef;

use super::document::parse_timestamp;
use super::RepositoryError;
use crate::DbPool;

/// Durable copy of the audit trail. The engine emits through an in-process
/// `AuditSink`; callers drain that sink into this table at commit points.
pub struct SqlAuditTrailRepository {
    pool: DbPool,
}

impl SqlAuditTrailRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn append(&self, event: AuditEvent) -> Result<(), RepositoryError> {
        let (subject_kind, subject_id) = match &event.subject {
            Some(WorkflowRef::Document(id)) => (Some("document"), Some(id.0.clone())),
            Some(WorkflowRef::Agreement(id)) => (Some("agreement"), Some(id.0.clone())),
            None => (None, None),
        };
        let metadata = serde_json::to_string(&event.metadata)
            .map_err(|e| RepositoryError::Decode(format!("encode metadata: {e}")))?;

        sqlx::query(
            "INSERT INTO audit_event (event_id, subject_kind, subject_id, correlation_id,
                                      event_type, category, actor, outcome, metadata,
                                      occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.event_id)
        .bind(subject_kind)
        .bind(subject_id)
        .bind(&event.correlation_id)
        .bind(&event.event_type)
        .bind(category_as_str(&event.category))
        .bind(&event.actor)
        .bind(outcome_as_str(&event.outcome))
        .bind(metadata)
        .bind(event.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_for_subject(
        &self,
        subject: &WorkflowRef,
    ) -> Result<Vec<AuditEvent>, RepositoryError> {
        let (kind, id) = match subject {
            WorkflowRef::Document(id) => ("document", &id.0),
            WorkflowRef::Agreement(id) => ("agreement", &id.0),
        };

        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT event_id, subject_kind, subject_id, correlation_id, event_type, category,
                    actor, outcome, metadata, occurred_at
             FROM audit_event
             WHERE subject_kind = ? AND subject_id = ?
             ORDER BY occurred_at ASC, event_id ASC",
        )
        .bind(kind)
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect()
    }
}

fn category_as_str(category: &AuditCategory) -> &'static str {
    match category {
        AuditCategory::Flow => "flow",
        AuditCategory::Approval => "approval",
        AuditCategory::Discussion => "discussion",
        AuditCategory::Persistence => "persistence",
        AuditCategory::System => "system",
    }
}

fn parse_category(s: &str) -> Result<AuditCategory, RepositoryError> {
    match s {
        "flow" => Ok(AuditCategory::Flow),
        "approval" => Ok(AuditCategory::Approval),
        "discussion" => Ok(AuditCategory::Discussion),
        "persistence" => Ok(AuditCategory::Persistence),
        "system" => Ok(AuditCategory::System),
        other => Err(RepositoryError::Decode(format!("unknown audit category `{other}`"))),
    }
}

fn outcome_as_str(outcome: &AuditOutcome) -> &'static str {
    match outcome {
        AuditOutcome::Success => "success",
        AuditOutcome::Rejected => "rejected",
        AuditOutcome::Failed => "failed",
    }
}

fn parse_outcome(s: &str) -> Result<AuditOutcome, RepositoryError> {
    match s {
        "success" => Ok(AuditOutcome::Success),
        "rejected" => Ok(AuditOutcome::Rejected),
        "failed" => Ok(AuditOutcome::Failed),
        other => Err(RepositoryError::Decode(format!("unknown audit outcome `{other}`"))),
    }
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<AuditEvent, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let subject_kind: Option<String> = row.try_get("subject_kind").map_err(decode)?;
    let subject_id: Option<String> = row.try_get("subject_id").map_err(decode)?;
    let category_str: String = row.try_get("category").map_err(decode)?;
    let outcome_str: String = row.try_get("outcome").map_err(decode)?;
    let metadata_json: String = row.try_get("metadata").map_err(decode)?;
    let occurred_at: String = row.try_get("occurred_at").map_err(decode)?;

    let subject = match (subject_kind.as_deref(), subject_id) {
        (Some("document"), Some(id)) => Some(WorkflowRef::Document(DocumentId(id))),
        (Some("agreement"), Some(id)) => Some(WorkflowRef::Agreement(AgreementId(id))),
        (None, _) => None,
        (Some(other), _) => {
            return Err(RepositoryError::Decode(format!("unknown subject kind `{other}`")))
        }
    };
    let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata_json)
        .map_err(|e| RepositoryError::Decode(format!("bad metadata json: {e}")))?;

    Ok(AuditEvent {
        event_id: row.try_get("event_id").map_err(decode)?,
        subject,
        correlation_id: row.try_get("correlation_id").map_err(decode)?,
        event_type: row.try_get("event_type").map_err(decode)?,
        category: parse_category(&category_str)?,
        actor: row.try_get("actor").map_err(decode)?,
        outcome: parse_outcome(&outcome_str)?,
        metadata,
        occurred_at: parse_timestamp(&occurred_at)?,
    })
}
