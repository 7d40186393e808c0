use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Submitted,
    PendingSupervisor,
    PendingGm,
    PendingLegal,
    PendingFinance,
    Discussion,
    AgreementCreation,
    Completed,
    Rejected,
}

impl DocumentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::Submitted
                | Self::PendingSupervisor
                | Self::PendingGm
                | Self::PendingLegal
                | Self::PendingFinance
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentRequest {
    pub id: DocumentId,
    pub title: String,
    pub description: String,
    pub requester_nik: String,
    pub supervisor_nik: Option<String>,
    pub division: String,
    pub directorate: String,
    pub status: DocumentStatus,
    pub priority: Priority,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRequest {
    /// Lifecycle guard. Status only ever moves along these edges; the
    /// workflow engine decides *which* edge, this decides whether the
    /// mutation itself is coherent.
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        use DocumentStatus::{
            AgreementCreation, Completed, Discussion, Draft, PendingFinance, PendingGm,
            PendingLegal, PendingSupervisor, Rejected, Submitted,
        };

        matches!(
            (&self.status, next),
            (Draft, PendingSupervisor)
                | (Draft, Submitted)
                | (Submitted, PendingSupervisor)
                | (PendingSupervisor, PendingGm)
                | (PendingGm, PendingLegal)
                | (PendingLegal, PendingFinance)
                | (PendingFinance, Discussion)
                | (Discussion, AgreementCreation)
                | (AgreementCreation, Completed)
                | (Submitted, Rejected)
                | (PendingSupervisor, Rejected)
                | (PendingGm, Rejected)
                | (PendingLegal, Rejected)
                | (PendingFinance, Rejected)
                | (Submitted, Draft)
                | (PendingSupervisor, Draft)
                | (PendingGm, Draft)
                | (PendingLegal, Draft)
                | (PendingFinance, Draft)
        )
    }

    pub fn transition_to(&mut self, next: DocumentStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidDocumentStatusChange { from: self.status, to: next })
    }
}
