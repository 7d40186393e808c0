use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::WorkflowRef;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Pending,
    Approved,
    Rejected,
}

/// Which rung of the chain an approval record belongs to. Shared between
/// both flows; the document flow never reaches the director stages and the
/// agreement flow never reaches discussion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStage {
    Supervisor,
    Head,
    GeneralManager,
    Legal,
    Finance,
    Discussion,
    AgreementCreation,
    Director1,
    Director2,
}

/// One row of the append-only audit trail. Records are never updated after
/// a decision is stamped; a new attempt appends a new record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub id: ApprovalId,
    pub parent: WorkflowRef,
    pub stage: ApprovalStage,
    pub approver_nik: String,
    pub approver_role: String,
    pub decision: ApprovalDecision,
    pub comments: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApprovalRecord {
    pub fn decided(
        parent: WorkflowRef,
        stage: ApprovalStage,
        approver_nik: impl Into<String>,
        approver_role: impl Into<String>,
        decision: ApprovalDecision,
        comments: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ApprovalId(uuid::Uuid::new_v4().to_string()),
            parent,
            stage,
            approver_nik: approver_nik.into(),
            approver_role: approver_role.into(),
            decision,
            comments,
            decided_at: Some(now),
            created_at: now,
        }
    }
}
