use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use docflow_core::domain::agreement::{AgreementId, AgreementOverview, AgreementStatus};
use docflow_core::domain::approval::ApprovalRecord;
use docflow_core::domain::document::{DocumentId, DocumentRequest, DocumentStatus};
use docflow_core::domain::WorkflowRef;

use super::{AgreementRepository, ApprovalRepository, DocumentRepository, RepositoryError};

/// Test doubles for the SQL repositories, sharing the same trait
/// contracts, including `Conflict` on stale transitions.
#[derive(Default)]
pub struct InMemoryDocumentRepository {
    documents: Mutex<HashMap<String, DocumentRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    async fn find_by_id(
        &self,
        id: &DocumentId,
    ) -> Result<Option<DocumentRequest>, RepositoryError> {
        Ok(lock(&self.documents).get(&id.0).cloned())
    }

    async fn list_by_status(
        &self,
        status: DocumentStatus,
    ) -> Result<Vec<DocumentRequest>, RepositoryError> {
        let mut matches: Vec<DocumentRequest> = lock(&self.documents)
            .values()
            .filter(|document| document.status == status)
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matches)
    }

    async fn save(&self, document: DocumentRequest) -> Result<(), RepositoryError> {
        lock(&self.documents).insert(document.id.0.clone(), document);
        Ok(())
    }

    async fn save_transition(
        &self,
        document: DocumentRequest,
        expected: DocumentStatus,
    ) -> Result<(), RepositoryError> {
        let mut documents = lock(&self.documents);
        match documents.get(&document.id.0) {
            Some(stored) if stored.status == expected => {
                documents.insert(document.id.0.clone(), document);
                Ok(())
            }
            _ => Err(RepositoryError::Conflict {
                entity: "document_request",
                id: document.id.0,
            }),
        }
    }
}

#[derive(Default)]
pub struct InMemoryAgreementRepository {
    agreements: Mutex<HashMap<String, AgreementOverview>>,
}

#[async_trait]
impl AgreementRepository for InMemoryAgreementRepository {
    async fn find_by_id(
        &self,
        id: &AgreementId,
    ) -> Result<Option<AgreementOverview>, RepositoryError> {
        Ok(lock(&self.agreements).get(&id.0).cloned())
    }

    async fn list_by_status(
        &self,
        status: AgreementStatus,
    ) -> Result<Vec<AgreementOverview>, RepositoryError> {
        let mut matches: Vec<AgreementOverview> = lock(&self.agreements)
            .values()
            .filter(|agreement| agreement.status == status)
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matches)
    }

    async fn save(&self, agreement: AgreementOverview) -> Result<(), RepositoryError> {
        lock(&self.agreements).insert(agreement.id.0.clone(), agreement);
        Ok(())
    }

    async fn save_transition(
        &self,
        agreement: AgreementOverview,
        expected: AgreementStatus,
    ) -> Result<(), RepositoryError> {
        let mut agreements = lock(&self.agreements);
        match agreements.get(&agreement.id.0) {
            Some(stored) if stored.status == expected => {
                agreements.insert(agreement.id.0.clone(), agreement);
                Ok(())
            }
            _ => Err(RepositoryError::Conflict {
                entity: "agreement_overview",
                id: agreement.id.0,
            }),
        }
    }
}

#[derive(Default)]
pub struct InMemoryApprovalRepository {
    records: Mutex<Vec<ApprovalRecord>>,
}

#[async_trait]
impl ApprovalRepository for InMemoryApprovalRepository {
    async fn append(&self, record: ApprovalRecord) -> Result<(), RepositoryError> {
        lock(&self.records).push(record);
        Ok(())
    }

    async fn find_by_parent(
        &self,
        parent: &WorkflowRef,
    ) -> Result<Vec<ApprovalRecord>, RepositoryError> {
        Ok(lock(&self.records)
            .iter()
            .filter(|record| &record.parent == parent)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use docflow_core::domain::document::{DocumentId, DocumentRequest, DocumentStatus, Priority};

    use super::InMemoryDocumentRepository;
    use crate::repositories::{DocumentRepository, RepositoryError};

    fn sample(id: &str, status: DocumentStatus) -> DocumentRequest {
        let now = Utc::now();
        DocumentRequest {
            id: DocumentId(id.to_string()),
            title: "Vendor NDA".to_string(),
            description: "NDA ahead of the warehouse tender".to_string(),
            requester_nik: "10001".to_string(),
            supervisor_nik: Some("20001".to_string()),
            division: "Logistics".to_string(),
            directorate: "Operations".to_string(),
            status,
            priority: Priority::Medium,
            submitted_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn save_transition_matches_sql_conflict_semantics() {
        let repo = InMemoryDocumentRepository::default();
        repo.save(sample("DR-001", DocumentStatus::PendingGm)).await.expect("save");

        let stale = sample("DR-001", DocumentStatus::Rejected);
        let error = repo
            .save_transition(stale, DocumentStatus::PendingSupervisor)
            .await
            .expect_err("stale status");
        assert!(matches!(error, RepositoryError::Conflict { .. }));

        let fresh = sample("DR-001", DocumentStatus::PendingLegal);
        repo.save_transition(fresh, DocumentStatus::PendingGm).await.expect("transition");
        let found = repo
            .find_by_id(&DocumentId("DR-001".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(found.status, DocumentStatus::PendingLegal);
    }
}
