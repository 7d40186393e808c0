use sqlx::Row;

use docflow_core::domain::agreement::AgreementId;
use docflow_core::domain::approval::{ApprovalDecision, ApprovalId, ApprovalRecord, ApprovalStage};
use docflow_core::domain::document::DocumentId;
use docflow_core::domain::WorkflowRef;

use super::document::{parse_optional_timestamp, parse_timestamp};
use super::{ApprovalRepository, RepositoryError};
use crate::DbPool;

pub struct SqlApprovalRepository {
    pool: DbPool,
}

impl SqlApprovalRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parent_kind(parent: &WorkflowRef) -> &'static str {
    match parent {
        WorkflowRef::Document(_) => "document",
        WorkflowRef::Agreement(_) => "agreement",
    }
}

fn parse_parent(kind: &str, id: String) -> Result<WorkflowRef, RepositoryError> {
    match kind {
        "document" => Ok(WorkflowRef::Document(DocumentId(id))),
        "agreement" => Ok(WorkflowRef::Agreement(AgreementId(id))),
        other => Err(RepositoryError::Decode(format!("unknown parent kind `{other}`"))),
    }
}

fn stage_as_str(stage: ApprovalStage) -> &'static str {
    match stage {
        ApprovalStage::Supervisor => "supervisor",
        ApprovalStage::Head => "head",
        ApprovalStage::GeneralManager => "general_manager",
        ApprovalStage::Legal => "legal",
        ApprovalStage::Finance => "finance",
        ApprovalStage::Discussion => "discussion",
        ApprovalStage::AgreementCreation => "agreement_creation",
        ApprovalStage::Director1 => "director1",
        ApprovalStage::Director2 => "director2",
    }
}

fn parse_stage(s: &str) -> Result<ApprovalStage, RepositoryError> {
    match s {
        "supervisor" => Ok(ApprovalStage::Supervisor),
        "head" => Ok(ApprovalStage::Head),
        "general_manager" => Ok(ApprovalStage::GeneralManager),
        "legal" => Ok(ApprovalStage::Legal),
        "finance" => Ok(ApprovalStage::Finance),
        "discussion" => Ok(ApprovalStage::Discussion),
        "agreement_creation" => Ok(ApprovalStage::AgreementCreation),
        "director1" => Ok(ApprovalStage::Director1),
        "director2" => Ok(ApprovalStage::Director2),
        other => Err(RepositoryError::Decode(format!("unknown approval stage `{other}`"))),
    }
}

fn decision_as_str(decision: ApprovalDecision) -> &'static str {
    match decision {
        ApprovalDecision::Pending => "pending",
        ApprovalDecision::Approved => "approved",
        ApprovalDecision::Rejected => "rejected",
    }
}

fn parse_decision(s: &str) -> Result<ApprovalDecision, RepositoryError> {
    match s {
        "pending" => Ok(ApprovalDecision::Pending),
        "approved" => Ok(ApprovalDecision::Approved),
        "rejected" => Ok(ApprovalDecision::Rejected),
        other => Err(RepositoryError::Decode(format!("unknown approval decision `{other}`"))),
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalRecord, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let kind: String = row.try_get("parent_kind").map_err(decode)?;
    let parent_id: String = row.try_get("parent_id").map_err(decode)?;
    let stage_str: String = row.try_get("stage").map_err(decode)?;
    let decision_str: String = row.try_get("decision").map_err(decode)?;
    let decided_at: Option<String> = row.try_get("decided_at").map_err(decode)?;
    let created_at: String = row.try_get("created_at").map_err(decode)?;

    Ok(ApprovalRecord {
        id: ApprovalId(row.try_get("id").map_err(decode)?),
        parent: parse_parent(&kind, parent_id)?,
        stage: parse_stage(&stage_str)?,
        approver_nik: row.try_get("approver_nik").map_err(decode)?,
        approver_role: row.try_get("approver_role").map_err(decode)?,
        decision: parse_decision(&decision_str)?,
        comments: row.try_get("comments").map_err(decode)?,
        decided_at: parse_optional_timestamp(decided_at)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait::async_trait]
impl ApprovalRepository for SqlApprovalRepository {
    async fn append(&self, record: ApprovalRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO approval_record (id, parent_kind, parent_id, stage, approver_nik,
                                          approver_role, decision, comments, decided_at,
                                          created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id.0)
        .bind(parent_kind(&record.parent))
        .bind(record.parent.raw_id())
        .bind(stage_as_str(record.stage))
        .bind(&record.approver_nik)
        .bind(&record.approver_role)
        .bind(decision_as_str(record.decision))
        .bind(&record.comments)
        .bind(record.decided_at.map(|dt| dt.to_rfc3339()))
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_parent(
        &self,
        parent: &WorkflowRef,
    ) -> Result<Vec<ApprovalRecord>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, parent_kind, parent_id, stage, approver_nik, approver_role, decision,
                    comments, decided_at, created_at
             FROM approval_record
             WHERE parent_kind = ? AND parent_id = ?
             ORDER BY created_at ASC, id ASC",
        )
        .bind(parent_kind(parent))
        .bind(parent.raw_id())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }
}
