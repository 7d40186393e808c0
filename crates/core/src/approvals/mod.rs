use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::agreement::{AgreementOverview, AgreementStatus};
use crate::domain::document::{DocumentRequest, DocumentStatus};
use crate::domain::user::Actor;
use crate::flows::states::FlowStep;

/// Keyword sets used for role-based approver matching. Matching is a
/// case-insensitive substring check against the actor's job title, the
/// policy inherited from the source system. `RoleContains` isolates it so
/// a later move to exact role enums touches one place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleKeywords {
    pub general_manager: Vec<String>,
    pub legal: Vec<String>,
    pub finance: Vec<String>,
    pub head_legal: Vec<String>,
}

impl Default for RoleKeywords {
    fn default() -> Self {
        Self {
            general_manager: vec!["general manager".to_string()],
            legal: vec!["legal".to_string()],
            finance: vec!["finance".to_string()],
            head_legal: vec!["head legal".to_string(), "head of legal".to_string()],
        }
    }
}

/// Expected approver for a step: either one exact employee or anyone whose
/// role string contains one of the keywords.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApproverRule {
    SpecificNik { nik: String },
    RoleContains { keywords: Vec<String> },
}

impl ApproverRule {
    pub fn matches(&self, actor: &Actor) -> bool {
        match self {
            Self::SpecificNik { nik } => normalize_key(&actor.nik) == normalize_key(nik),
            Self::RoleContains { keywords } => {
                let role = normalize_key(&actor.role);
                keywords.iter().any(|keyword| role.contains(&normalize_key(keyword)))
            }
        }
    }

    fn role(keywords: &[String]) -> Self {
        Self::RoleContains { keywords: keywords.to_vec() }
    }

    fn nik(nik: &str) -> Self {
        Self::SpecificNik { nik: nik.to_string() }
    }
}

/// Persisted per-division chain configuration: who heads the division and
/// who can stand in when a document carries no recorded supervisor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivisionChain {
    pub division: String,
    pub manager_nik: String,
    pub senior_manager_nik: Option<String>,
    pub gm_nik: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no approval chain configured for division `{division}`")]
    UnknownDivision { division: String },
    #[error("document `{document_id}` has no supervisor and division `{division}` has no chain entry")]
    MissingSupervisor { document_id: String, division: String },
    #[error("agreement `{agreement_id}` is missing director{which}")]
    MissingDirector { agreement_id: String, which: u8 },
    #[error("step {step:?} has no approver")]
    NotApprovable { step: FlowStep },
}

#[derive(Clone, Debug)]
pub struct ChainResolver {
    chains: HashMap<String, DivisionChain>,
    keywords: RoleKeywords,
}

impl ChainResolver {
    pub fn new(chains: Vec<DivisionChain>, keywords: RoleKeywords) -> Self {
        let chains =
            chains.into_iter().map(|chain| (normalize_key(&chain.division), chain)).collect();
        Self { chains, keywords }
    }

    pub fn keywords(&self) -> &RoleKeywords {
        &self.keywords
    }

    /// Expected approver for a document request at its current status.
    pub fn resolve_document(
        &self,
        document: &DocumentRequest,
    ) -> Result<ApproverRule, ResolveError> {
        match document.status {
            DocumentStatus::Submitted | DocumentStatus::PendingSupervisor => {
                self.supervisor_rule(document)
            }
            DocumentStatus::PendingGm => Ok(ApproverRule::role(&self.keywords.general_manager)),
            DocumentStatus::PendingLegal => Ok(ApproverRule::role(&self.keywords.legal)),
            DocumentStatus::PendingFinance => Ok(ApproverRule::role(&self.keywords.finance)),
            // Only head legal may close the forum and move the document on.
            DocumentStatus::Discussion => Ok(ApproverRule::role(&self.keywords.head_legal)),
            DocumentStatus::AgreementCreation => Ok(ApproverRule::role(&self.keywords.legal)),
            DocumentStatus::Draft
            | DocumentStatus::Completed
            | DocumentStatus::Rejected => {
                Err(ResolveError::NotApprovable { step: document.status.into() })
            }
        }
    }

    /// Expected approver for an agreement overview at its current status.
    pub fn resolve_agreement(
        &self,
        agreement: &AgreementOverview,
    ) -> Result<ApproverRule, ResolveError> {
        match agreement.status {
            AgreementStatus::PendingHead => {
                let chain = self.chain_for(&agreement.division)?;
                Ok(ApproverRule::nik(&chain.manager_nik))
            }
            AgreementStatus::PendingGm => Ok(ApproverRule::role(&self.keywords.general_manager)),
            AgreementStatus::PendingFinance => Ok(ApproverRule::role(&self.keywords.finance)),
            AgreementStatus::PendingLegal => Ok(ApproverRule::role(&self.keywords.legal)),
            AgreementStatus::PendingDirector1 => {
                director_rule(agreement, agreement.director1_nik.as_deref(), 1)
            }
            AgreementStatus::PendingDirector2 => {
                director_rule(agreement, agreement.director2_nik.as_deref(), 2)
            }
            AgreementStatus::Draft | AgreementStatus::Approved | AgreementStatus::Rejected => {
                Err(ResolveError::NotApprovable { step: agreement.status.into() })
            }
        }
    }

    pub fn can_approve_document(&self, actor: &Actor, document: &DocumentRequest) -> bool {
        self.resolve_document(document).map(|rule| rule.matches(actor)).unwrap_or(false)
    }

    pub fn can_approve_agreement(&self, actor: &Actor, agreement: &AgreementOverview) -> bool {
        self.resolve_agreement(agreement).map(|rule| rule.matches(actor)).unwrap_or(false)
    }

    /// Recorded supervisor wins; otherwise fall back down the division
    /// chain (manager, then senior manager, then GM).
    fn supervisor_rule(&self, document: &DocumentRequest) -> Result<ApproverRule, ResolveError> {
        if let Some(nik) = &document.supervisor_nik {
            return Ok(ApproverRule::nik(nik));
        }

        let chain = self.chains.get(&normalize_key(&document.division));
        let fallback = chain.map(|chain| chain.manager_nik.as_str());
        match fallback {
            Some(nik) => Ok(ApproverRule::nik(nik)),
            None => Err(ResolveError::MissingSupervisor {
                document_id: document.id.0.clone(),
                division: document.division.clone(),
            }),
        }
    }

    fn chain_for(&self, division: &str) -> Result<&DivisionChain, ResolveError> {
        self.chains
            .get(&normalize_key(division))
            .ok_or_else(|| ResolveError::UnknownDivision { division: division.to_string() })
    }
}

fn director_rule(
    agreement: &AgreementOverview,
    nik: Option<&str>,
    which: u8,
) -> Result<ApproverRule, ResolveError> {
    match nik {
        Some(nik) if !nik.trim().is_empty() => Ok(ApproverRule::nik(nik)),
        _ => Err(ResolveError::MissingDirector { agreement_id: agreement.id.0.clone(), which }),
    }
}

pub(crate) fn normalize_key(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}
