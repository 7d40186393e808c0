use async_trait::async_trait;
use thiserror::Error;

use docflow_core::discussion::DiscussionState;
use docflow_core::domain::agreement::{AgreementId, AgreementOverview, AgreementStatus};
use docflow_core::domain::approval::ApprovalRecord;
use docflow_core::domain::comment::DocumentComment;
use docflow_core::domain::document::{DocumentId, DocumentRequest, DocumentStatus};
use docflow_core::domain::WorkflowRef;

pub mod agreement;
pub mod approval;
pub mod audit_trail;
pub mod comment;
pub mod discussion;
pub mod document;
pub mod memory;

pub use agreement::SqlAgreementRepository;
pub use approval::SqlApprovalRepository;
pub use audit_trail::SqlAuditTrailRepository;
pub use comment::SqlCommentRepository;
pub use discussion::SqlDiscussionRepository;
pub use document::SqlDocumentRepository;
pub use memory::{
    InMemoryAgreementRepository, InMemoryApprovalRepository, InMemoryDocumentRepository,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    /// The row's status no longer matched the status the caller loaded.
    /// Another writer got there first; reload and retry.
    #[error("stale write for {entity} `{id}`")]
    Conflict { entity: &'static str, id: String },
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn find_by_id(&self, id: &DocumentId) -> Result<Option<DocumentRequest>, RepositoryError>;
    async fn list_by_status(
        &self,
        status: DocumentStatus,
    ) -> Result<Vec<DocumentRequest>, RepositoryError>;
    async fn save(&self, document: DocumentRequest) -> Result<(), RepositoryError>;
    /// Writes the document only if the stored status still equals
    /// `expected`. Fails with `Conflict` otherwise.
    async fn save_transition(
        &self,
        document: DocumentRequest,
        expected: DocumentStatus,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait AgreementRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &AgreementId,
    ) -> Result<Option<AgreementOverview>, RepositoryError>;
    async fn list_by_status(
        &self,
        status: AgreementStatus,
    ) -> Result<Vec<AgreementOverview>, RepositoryError>;
    async fn save(&self, agreement: AgreementOverview) -> Result<(), RepositoryError>;
    async fn save_transition(
        &self,
        agreement: AgreementOverview,
        expected: AgreementStatus,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    /// Approval rows are append-only; there is no update path.
    async fn append(&self, record: ApprovalRecord) -> Result<(), RepositoryError>;
    async fn find_by_parent(
        &self,
        parent: &WorkflowRef,
    ) -> Result<Vec<ApprovalRecord>, RepositoryError>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn append(&self, comment: DocumentComment) -> Result<(), RepositoryError>;
    async fn list_for_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<DocumentComment>, RepositoryError>;
}

#[async_trait]
pub trait DiscussionRepository: Send + Sync {
    async fn find_for_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Option<DiscussionState>, RepositoryError>;
    async fn save(&self, state: DiscussionState) -> Result<(), RepositoryError>;
}
