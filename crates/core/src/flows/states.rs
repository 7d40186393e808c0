use serde::{Deserialize, Serialize};

use crate::domain::agreement::AgreementStatus;
use crate::domain::approval::ApprovalStage;
use crate::domain::document::DocumentStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowKind {
    DocumentRequest,
    Agreement,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    Submit,
    Approve,
    Reject,
    RequestRevision,
    CloseDiscussion,
}

/// Union of both status sets, the vocabulary the engine works in. Domain
/// enums convert into it losslessly; conversion back is per flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    Draft,
    Submitted,
    PendingSupervisor,
    PendingHead,
    PendingGm,
    PendingLegal,
    PendingFinance,
    Discussion,
    AgreementCreation,
    PendingDirector1,
    PendingDirector2,
    Completed,
    Approved,
    Rejected,
}

impl FlowStep {
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::Submitted
                | Self::PendingSupervisor
                | Self::PendingHead
                | Self::PendingGm
                | Self::PendingLegal
                | Self::PendingFinance
                | Self::PendingDirector1
                | Self::PendingDirector2
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Approved | Self::Rejected)
    }

    /// The chain rung an approval decided at this step is recorded under.
    pub fn approval_stage(&self) -> Option<ApprovalStage> {
        match self {
            Self::Submitted | Self::PendingSupervisor => Some(ApprovalStage::Supervisor),
            Self::PendingHead => Some(ApprovalStage::Head),
            Self::PendingGm => Some(ApprovalStage::GeneralManager),
            Self::PendingLegal => Some(ApprovalStage::Legal),
            Self::PendingFinance => Some(ApprovalStage::Finance),
            Self::Discussion => Some(ApprovalStage::Discussion),
            Self::AgreementCreation => Some(ApprovalStage::AgreementCreation),
            Self::PendingDirector1 => Some(ApprovalStage::Director1),
            Self::PendingDirector2 => Some(ApprovalStage::Director2),
            Self::Draft | Self::Completed | Self::Approved | Self::Rejected => None,
        }
    }

    pub fn as_document_status(&self) -> Option<DocumentStatus> {
        match self {
            Self::Draft => Some(DocumentStatus::Draft),
            Self::Submitted => Some(DocumentStatus::Submitted),
            Self::PendingSupervisor => Some(DocumentStatus::PendingSupervisor),
            Self::PendingGm => Some(DocumentStatus::PendingGm),
            Self::PendingLegal => Some(DocumentStatus::PendingLegal),
            Self::PendingFinance => Some(DocumentStatus::PendingFinance),
            Self::Discussion => Some(DocumentStatus::Discussion),
            Self::AgreementCreation => Some(DocumentStatus::AgreementCreation),
            Self::Completed => Some(DocumentStatus::Completed),
            Self::Rejected => Some(DocumentStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_agreement_status(&self) -> Option<AgreementStatus> {
        match self {
            Self::Draft => Some(AgreementStatus::Draft),
            Self::PendingHead => Some(AgreementStatus::PendingHead),
            Self::PendingGm => Some(AgreementStatus::PendingGm),
            Self::PendingFinance => Some(AgreementStatus::PendingFinance),
            Self::PendingLegal => Some(AgreementStatus::PendingLegal),
            Self::PendingDirector1 => Some(AgreementStatus::PendingDirector1),
            Self::PendingDirector2 => Some(AgreementStatus::PendingDirector2),
            Self::Approved => Some(AgreementStatus::Approved),
            Self::Rejected => Some(AgreementStatus::Rejected),
            _ => None,
        }
    }
}

impl From<DocumentStatus> for FlowStep {
    fn from(status: DocumentStatus) -> Self {
        match status {
            DocumentStatus::Draft => Self::Draft,
            DocumentStatus::Submitted => Self::Submitted,
            DocumentStatus::PendingSupervisor => Self::PendingSupervisor,
            DocumentStatus::PendingGm => Self::PendingGm,
            DocumentStatus::PendingLegal => Self::PendingLegal,
            DocumentStatus::PendingFinance => Self::PendingFinance,
            DocumentStatus::Discussion => Self::Discussion,
            DocumentStatus::AgreementCreation => Self::AgreementCreation,
            DocumentStatus::Completed => Self::Completed,
            DocumentStatus::Rejected => Self::Rejected,
        }
    }
}

impl From<AgreementStatus> for FlowStep {
    fn from(status: AgreementStatus) -> Self {
        match status {
            AgreementStatus::Draft => Self::Draft,
            AgreementStatus::PendingHead => Self::PendingHead,
            AgreementStatus::PendingGm => Self::PendingGm,
            AgreementStatus::PendingFinance => Self::PendingFinance,
            AgreementStatus::PendingLegal => Self::PendingLegal,
            AgreementStatus::PendingDirector1 => Self::PendingDirector1,
            AgreementStatus::PendingDirector2 => Self::PendingDirector2,
            AgreementStatus::Approved => Self::Approved,
            AgreementStatus::Rejected => Self::Rejected,
        }
    }
}

/// Validation context supplied by the caller. The engine itself never
/// inspects entity fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FlowContext {
    pub missing_required_fields: Vec<String>,
}

/// Side effects the caller must perform after a successful transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionEffect {
    MarkSubmitted,
    ClearSubmission,
    MarkCompleted,
    RecordApproval,
    NotifyNextApprover,
    NotifyRequester,
    OpenDiscussion,
    CloseForum,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: FlowStep,
    pub to: FlowStep,
    pub action: WorkflowAction,
    pub effects: Vec<TransitionEffect>,
}
