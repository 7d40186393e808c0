pub mod agreement;
pub mod approval;
pub mod comment;
pub mod document;
pub mod user;

use serde::{Deserialize, Serialize};

use agreement::AgreementId;
use document::DocumentId;

/// Reference to either kind of workflow subject, used wherever records
/// (approvals, audit events, notifications) can hang off both.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum WorkflowRef {
    Document(DocumentId),
    Agreement(AgreementId),
}

impl WorkflowRef {
    pub fn raw_id(&self) -> &str {
        match self {
            Self::Document(id) => &id.0,
            Self::Agreement(id) => &id.0,
        }
    }
}
