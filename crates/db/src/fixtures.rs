use chrono::Utc;

use docflow_core::domain::agreement::{AgreementId, AgreementOverview, AgreementStatus};
use docflow_core::domain::approval::{ApprovalDecision, ApprovalRecord, ApprovalStage};
use docflow_core::domain::document::{DocumentId, DocumentRequest, DocumentStatus, Priority};
use docflow_core::domain::WorkflowRef;

use crate::connection::DbPool;
use crate::repositories::{
    AgreementRepository, ApprovalRepository, DocumentRepository, RepositoryError,
    SqlAgreementRepository, SqlApprovalRepository, SqlDocumentRepository,
};

const SEED_DOCUMENT_ID: &str = "DR-SEED-001";
const SEED_AGREEMENT_ID: &str = "AO-SEED-001";

#[derive(Debug)]
pub struct SeedResult {
    pub document_id: DocumentId,
    pub agreement_id: AgreementId,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub checks: Vec<(&'static str, bool)>,
}

impl VerificationResult {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|(_, passed)| *passed)
    }
}

/// Deterministic fixtures for end-to-end exercising of both flows: one
/// document request parked at pending_gm with its supervisor approval
/// already stamped, and one agreement overview waiting on director 1.
pub struct WorkflowSeedDataset;

impl WorkflowSeedDataset {
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let now = Utc::now();

        let documents = SqlDocumentRepository::new(pool.clone());
        documents
            .save(DocumentRequest {
                id: DocumentId(SEED_DOCUMENT_ID.to_string()),
                title: "Warehouse lease addendum".to_string(),
                description: "Extension of the Cakung warehouse lease".to_string(),
                requester_nik: "10001".to_string(),
                supervisor_nik: Some("20001".to_string()),
                division: "Logistics".to_string(),
                directorate: "Operations".to_string(),
                status: DocumentStatus::PendingGm,
                priority: Priority::High,
                submitted_at: Some(now),
                completed_at: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        let approvals = SqlApprovalRepository::new(pool.clone());
        approvals
            .append(ApprovalRecord::decided(
                WorkflowRef::Document(DocumentId(SEED_DOCUMENT_ID.to_string())),
                ApprovalStage::Supervisor,
                "20001",
                "Logistics Manager",
                ApprovalDecision::Approved,
                Some("scope verified".to_string()),
            ))
            .await?;

        let agreements = SqlAgreementRepository::new(pool.clone());
        agreements
            .save(AgreementOverview {
                id: AgreementId(SEED_AGREEMENT_ID.to_string()),
                title: "Master service agreement".to_string(),
                requester_nik: "10001".to_string(),
                counterparty: "PT Sentosa Abadi".to_string(),
                division: "Logistics".to_string(),
                directorate: "Operations".to_string(),
                is_draft: false,
                director1_nik: Some("90001".to_string()),
                director2_nik: Some("90002".to_string()),
                status: AgreementStatus::PendingDirector1,
                submitted_at: Some(now),
                completed_at: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        Ok(SeedResult {
            document_id: DocumentId(SEED_DOCUMENT_ID.to_string()),
            agreement_id: AgreementId(SEED_AGREEMENT_ID.to_string()),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let document_ok: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM document_request WHERE id = ?1 AND status = 'pending_gm')",
        )
        .bind(SEED_DOCUMENT_ID)
        .fetch_one(pool)
        .await?;
        checks.push(("seed-document", document_ok == 1));

        let approval_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM approval_record WHERE parent_kind = 'document' AND parent_id = ?1",
        )
        .bind(SEED_DOCUMENT_ID)
        .fetch_one(pool)
        .await?;
        checks.push(("seed-document-approvals", approval_count == 1));

        let agreement_ok: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM agreement_overview
                           WHERE id = ?1 AND status = 'pending_director1')",
        )
        .bind(SEED_AGREEMENT_ID)
        .fetch_one(pool)
        .await?;
        checks.push(("seed-agreement", agreement_ok == 1));

        Ok(VerificationResult { checks })
    }
}

#[cfg(test)]
mod tests {
    use docflow_core::domain::document::DocumentStatus;

    use super::WorkflowSeedDataset;
    use crate::repositories::{DocumentRepository, SqlDocumentRepository};
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn seed_loads_and_verifies() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let seeded = WorkflowSeedDataset::load(&pool).await.expect("load");
        assert_eq!(seeded.document_id.0, "DR-SEED-001");

        let verification = WorkflowSeedDataset::verify(&pool).await.expect("verify");
        assert!(verification.all_passed(), "failed checks: {:?}", verification.checks);

        let documents = SqlDocumentRepository::new(pool);
        let document = documents
            .find_by_id(&seeded.document_id)
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(document.status, DocumentStatus::PendingGm);
    }
}
