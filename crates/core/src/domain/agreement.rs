use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgreementId(pub String);

/// Agreement overviews carry director-specific steps that document
/// requests never enter, so they keep their own status enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementStatus {
    Draft,
    PendingHead,
    PendingGm,
    PendingFinance,
    PendingLegal,
    PendingDirector1,
    PendingDirector2,
    Approved,
    Rejected,
}

impl AgreementStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::PendingHead
                | Self::PendingGm
                | Self::PendingFinance
                | Self::PendingLegal
                | Self::PendingDirector1
                | Self::PendingDirector2
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgreementOverview {
    pub id: AgreementId,
    pub title: String,
    pub requester_nik: String,
    pub counterparty: String,
    pub division: String,
    pub directorate: String,
    pub is_draft: bool,
    pub director1_nik: Option<String>,
    pub director2_nik: Option<String>,
    pub status: AgreementStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgreementOverview {
    pub fn can_transition_to(&self, next: AgreementStatus) -> bool {
        use AgreementStatus::{
            Approved, Draft, PendingDirector1, PendingDirector2, PendingFinance, PendingGm,
            PendingHead, PendingLegal, Rejected,
        };

        if next == Rejected || next == Draft {
            return self.status.is_pending();
        }

        matches!(
            (&self.status, next),
            (Draft, PendingHead)
                | (PendingHead, PendingGm)
                | (PendingGm, PendingFinance)
                | (PendingFinance, PendingLegal)
                | (PendingLegal, PendingDirector1)
                | (PendingDirector1, PendingDirector2)
                | (PendingDirector2, Approved)
        )
    }

    pub fn transition_to(&mut self, next: AgreementStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            self.is_draft = next == AgreementStatus::Draft;
            return Ok(());
        }

        Err(DomainError::InvalidAgreementStatusChange { from: self.status, to: next })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{AgreementId, AgreementOverview, AgreementStatus};

    fn agreement(status: AgreementStatus) -> AgreementOverview {
        AgreementOverview {
            id: AgreementId("AO-1".to_string()),
            title: "Master service agreement".to_string(),
            requester_nik: "10001".to_string(),
            counterparty: "PT Sentosa Abadi".to_string(),
            division: "Logistics".to_string(),
            directorate: "Operations".to_string(),
            is_draft: status == AgreementStatus::Draft,
            director1_nik: Some("90001".to_string()),
            director2_nik: Some("90002".to_string()),
            status,
            submitted_at: None,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn walks_the_full_director_chain() {
        let mut overview = agreement(AgreementStatus::Draft);
        for next in [
            AgreementStatus::PendingHead,
            AgreementStatus::PendingGm,
            AgreementStatus::PendingFinance,
            AgreementStatus::PendingLegal,
            AgreementStatus::PendingDirector1,
            AgreementStatus::PendingDirector2,
            AgreementStatus::Approved,
        ] {
            overview.transition_to(next).expect("chain step");
        }
        assert_eq!(overview.status, AgreementStatus::Approved);
    }

    #[test]
    fn revision_path_returns_to_draft_and_restores_draft_flag() {
        let mut overview = agreement(AgreementStatus::PendingDirector1);
        overview.transition_to(AgreementStatus::Draft).expect("revision");
        assert!(overview.is_draft);
    }

    #[test]
    fn rejected_agreement_cannot_be_advanced() {
        let overview = agreement(AgreementStatus::Rejected);
        assert!(!overview.can_transition_to(AgreementStatus::PendingDirector2));
        assert!(!overview.can_transition_to(AgreementStatus::Approved));
    }

    #[test]
    fn director_order_is_enforced() {
        let overview = agreement(AgreementStatus::PendingLegal);
        assert!(!overview.can_transition_to(AgreementStatus::PendingDirector2));
        assert!(overview.can_transition_to(AgreementStatus::PendingDirector1));
    }
}
