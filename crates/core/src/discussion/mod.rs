use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::approvals::{normalize_key, RoleKeywords};
use crate::domain::document::DocumentId;
use crate::domain::user::Actor;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DiscussionError {
    #[error("discussion forum for document `{document_id}` is not open")]
    NotOpen { document_id: String },
    #[error("discussion forum for document `{document_id}` cannot close before finance has posted")]
    FinanceNotHeard { document_id: String },
    #[error("actor `{nik}` is not head legal and may not close the forum")]
    NotForumModerator { nik: String },
}

/// Per-document forum gate: tracks openness and which roles have posted.
/// Closure is reserved for head legal, and only after finance has been
/// heard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscussionState {
    pub document_id: DocumentId,
    pub open: bool,
    /// Normalized role strings of everyone who posted a non-system comment.
    pub participant_roles: BTreeSet<String>,
    pub closed_by: Option<String>,
    pub closed_reason: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl DiscussionState {
    pub fn open(document_id: DocumentId) -> Self {
        Self {
            document_id,
            open: true,
            participant_roles: BTreeSet::new(),
            closed_by: None,
            closed_reason: None,
            closed_at: None,
        }
    }

    pub fn record_participant(&mut self, role: &str) {
        let role = normalize_key(role);
        if role.is_empty() || role == "system" {
            return;
        }
        self.participant_roles.insert(role);
    }

    pub fn finance_has_posted(&self, keywords: &RoleKeywords) -> bool {
        self.participant_roles.iter().any(|role| {
            keywords.finance.iter().any(|keyword| role.contains(&normalize_key(keyword)))
        })
    }

    pub fn can_close(&self, actor: &Actor, keywords: &RoleKeywords) -> bool {
        self.open && self.finance_has_posted(keywords) && is_head_legal(actor, keywords)
    }

    pub fn close(
        &mut self,
        actor: &Actor,
        reason: &str,
        keywords: &RoleKeywords,
    ) -> Result<(), DiscussionError> {
        if !self.open {
            return Err(DiscussionError::NotOpen { document_id: self.document_id.0.clone() });
        }
        if !is_head_legal(actor, keywords) {
            return Err(DiscussionError::NotForumModerator { nik: actor.nik.clone() });
        }
        if !self.finance_has_posted(keywords) {
            return Err(DiscussionError::FinanceNotHeard {
                document_id: self.document_id.0.clone(),
            });
        }

        self.open = false;
        self.closed_by = Some(actor.nik.clone());
        self.closed_reason = Some(reason.to_string());
        self.closed_at = Some(Utc::now());
        Ok(())
    }
}

fn is_head_legal(actor: &Actor, keywords: &RoleKeywords) -> bool {
    let role = normalize_key(&actor.role);
    keywords.head_legal.iter().any(|keyword| role.contains(&normalize_key(keyword)))
}
