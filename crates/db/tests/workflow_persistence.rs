//! End-to-end check that engine outcomes survive the round trip through
//! the SQL repositories, including the stale-write guard.

use chrono::Utc;

use docflow_core::{
    Actor, ChainResolver, DivisionChain, DocumentCase, DocumentId, DocumentRequest,
    DocumentStatus, InMemoryAuditSink, InMemoryDispatcher, Priority, RoleKeywords, WorkflowRef,
    WorkflowService,
};
use docflow_db::repositories::{
    ApprovalRepository, DocumentRepository, RepositoryError, SqlApprovalRepository,
    SqlDocumentRepository,
};
use docflow_db::{connect_with_settings, migrations};

async fn setup() -> sqlx::SqlitePool {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    pool
}

fn service() -> WorkflowService<InMemoryDispatcher, InMemoryAuditSink> {
    let resolver = ChainResolver::new(
        vec![DivisionChain {
            division: "Logistics".to_string(),
            manager_nik: "20001".to_string(),
            senior_manager_nik: None,
            gm_nik: Some("30001".to_string()),
        }],
        RoleKeywords::default(),
    );
    WorkflowService::new(resolver, InMemoryDispatcher::default(), InMemoryAuditSink::default())
}

fn draft_document(id: &str) -> DocumentRequest {
    let now = Utc::now();
    DocumentRequest {
        id: DocumentId(id.to_string()),
        title: "Vendor NDA".to_string(),
        description: "NDA ahead of the warehouse tender".to_string(),
        requester_nik: "10001".to_string(),
        supervisor_nik: Some("20001".to_string()),
        division: "Logistics".to_string(),
        directorate: "Operations".to_string(),
        status: DocumentStatus::Draft,
        priority: Priority::Medium,
        submitted_at: None,
        completed_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn transitions_persist_through_the_sql_repositories() {
    let pool = setup().await;
    let documents = SqlDocumentRepository::new(pool.clone());
    let approvals = SqlApprovalRepository::new(pool.clone());
    let service = service();

    let requester = Actor::new("10001", "Adi", "Logistics Staff", "Logistics", "Operations");
    let supervisor = Actor::new("20001", "Tono", "Logistics Manager", "Logistics", "Operations");

    documents.save(draft_document("DR-001")).await.expect("insert draft");

    // Submit: load, apply, store under the status we loaded.
    let loaded = documents
        .find_by_id(&DocumentId("DR-001".to_string()))
        .await
        .expect("find")
        .expect("exists");
    let mut case = DocumentCase::new(loaded);
    let before = case.request.status;
    service.submit_document(&mut case, &requester).expect("submit");
    documents.save_transition(case.request.clone(), before).await.expect("persist submit");

    // Supervisor approval, same pattern, plus the appended approval row.
    let loaded = documents
        .find_by_id(&DocumentId("DR-001".to_string()))
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(loaded.status, DocumentStatus::PendingSupervisor);

    let mut case = DocumentCase::new(loaded);
    let before = case.request.status;
    service.approve_document(&mut case, &supervisor, None).expect("approve");
    documents.save_transition(case.request.clone(), before).await.expect("persist approve");
    for record in case.approvals.drain(..) {
        approvals.append(record).await.expect("append approval");
    }

    let stored = documents
        .find_by_id(&DocumentId("DR-001".to_string()))
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(stored.status, DocumentStatus::PendingGm);

    let trail = approvals
        .find_by_parent(&WorkflowRef::Document(DocumentId("DR-001".to_string())))
        .await
        .expect("trail");
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].approver_nik, "20001");
}

#[tokio::test]
async fn concurrent_decisions_lose_to_the_first_writer() {
    let pool = setup().await;
    let documents = SqlDocumentRepository::new(pool.clone());
    let service = service();

    let supervisor = Actor::new("20001", "Tono", "Logistics Manager", "Logistics", "Operations");

    let mut seeded = draft_document("DR-001");
    seeded.status = DocumentStatus::PendingSupervisor;
    seeded.submitted_at = Some(Utc::now());
    documents.save(seeded.clone()).await.expect("insert");

    // Two actors loaded the same pending document.
    let mut first = DocumentCase::new(seeded.clone());
    let mut second = DocumentCase::new(seeded);

    service.approve_document(&mut first, &supervisor, None).expect("first approve");
    documents
        .save_transition(first.request.clone(), DocumentStatus::PendingSupervisor)
        .await
        .expect("first write wins");

    service.reject_document(&mut second, &supervisor, "duplicate request").expect("second decide");
    let error = documents
        .save_transition(second.request.clone(), DocumentStatus::PendingSupervisor)
        .await
        .expect_err("second write is stale");
    assert!(matches!(error, RepositoryError::Conflict { .. }));

    let stored = documents
        .find_by_id(&DocumentId("DR-001".to_string()))
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(stored.status, DocumentStatus::PendingGm);
}
