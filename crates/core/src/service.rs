use chrono::Utc;
use uuid::Uuid;

use crate::approvals::{ApproverRule, ChainResolver, ResolveError};
use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use crate::discussion::{DiscussionError, DiscussionState};
use crate::domain::agreement::AgreementOverview;
use crate::domain::approval::{ApprovalDecision, ApprovalRecord, ApprovalStage};
use crate::domain::comment::DocumentComment;
use crate::domain::document::{DocumentRequest, DocumentStatus};
use crate::domain::user::Actor;
use crate::domain::WorkflowRef;
use crate::errors::{ApplicationError, DomainError};
use crate::flows::engine::{AgreementFlow, DocumentFlow, FlowEngine};
use crate::flows::states::{
    FlowContext, FlowStep, TransitionEffect, TransitionOutcome, WorkflowAction,
};
use crate::notify::{Notification, NotificationDispatcher, NotificationTarget, WorkflowEvent};

/// A document request together with everything the engine mutates
/// alongside it. Persistence loads and stores the whole case.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentCase {
    pub request: DocumentRequest,
    pub approvals: Vec<ApprovalRecord>,
    pub comments: Vec<DocumentComment>,
    pub discussion: Option<DiscussionState>,
}

impl DocumentCase {
    pub fn new(request: DocumentRequest) -> Self {
        Self { request, approvals: Vec::new(), comments: Vec::new(), discussion: None }
    }

    /// Status and approval trail must agree: the latest approved record's
    /// stage has to be the rung directly behind the current status.
    pub fn is_audit_consistent(&self) -> bool {
        let expected = match self.request.status {
            DocumentStatus::PendingGm => Some(ApprovalStage::Supervisor),
            DocumentStatus::PendingLegal => Some(ApprovalStage::GeneralManager),
            DocumentStatus::PendingFinance => Some(ApprovalStage::Legal),
            DocumentStatus::Discussion => Some(ApprovalStage::Finance),
            DocumentStatus::AgreementCreation => Some(ApprovalStage::Discussion),
            DocumentStatus::Completed => Some(ApprovalStage::AgreementCreation),
            _ => None,
        };
        let Some(expected) = expected else {
            return true;
        };

        self.approvals
            .iter()
            .rev()
            .find(|record| record.decision == ApprovalDecision::Approved)
            .map(|record| record.stage == expected)
            .unwrap_or(false)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AgreementCase {
    pub overview: AgreementOverview,
    pub approvals: Vec<ApprovalRecord>,
}

impl AgreementCase {
    pub fn new(overview: AgreementOverview) -> Self {
        Self { overview, approvals: Vec::new() }
    }
}

/// Front door of the workflow engine. Validates legality against the
/// status machine, authorization against the chain resolver, then applies
/// the mutation, appends the approval record and emits notifications —
/// all or nothing per call.
pub struct WorkflowService<N, S> {
    resolver: ChainResolver,
    document_flow: FlowEngine<DocumentFlow>,
    agreement_flow: FlowEngine<AgreementFlow>,
    dispatcher: N,
    audit: S,
}

impl<N, S> WorkflowService<N, S>
where
    N: NotificationDispatcher,
    S: AuditSink,
{
    pub fn new(resolver: ChainResolver, dispatcher: N, audit: S) -> Self {
        Self {
            resolver,
            document_flow: FlowEngine::default(),
            agreement_flow: FlowEngine::default(),
            dispatcher,
            audit,
        }
    }

    pub fn dispatcher(&self) -> &N {
        &self.dispatcher
    }

    // ----- document request operations -----

    pub fn submit_document(
        &self,
        case: &mut DocumentCase,
        actor: &Actor,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let step = FlowStep::from(case.request.status);
        if actor.nik != case.request.requester_nik {
            self.audit_denied(document_ref(case), actor, "submit.not_requester");
            return Err(DomainError::Unauthorized { nik: actor.nik.clone(), step }.into());
        }

        let context = FlowContext {
            missing_required_fields: missing_document_fields(&case.request),
        };
        let outcome = self
            .document_flow
            .apply(&step, WorkflowAction::Submit, &context)
            .map_err(|error| self.flow_denied(document_ref(case), actor, error))?;

        self.commit_document(case, actor, outcome, None)
    }

    pub fn approve_document(
        &self,
        case: &mut DocumentCase,
        actor: &Actor,
        comments: Option<String>,
    ) -> Result<TransitionOutcome, ApplicationError> {
        self.decide_document(case, actor, WorkflowAction::Approve, comments)
    }

    pub fn reject_document(
        &self,
        case: &mut DocumentCase,
        actor: &Actor,
        reason: impl Into<String>,
    ) -> Result<TransitionOutcome, ApplicationError> {
        self.decide_document(case, actor, WorkflowAction::Reject, Some(reason.into()))
    }

    pub fn request_revision(
        &self,
        case: &mut DocumentCase,
        actor: &Actor,
        notes: impl Into<String>,
    ) -> Result<TransitionOutcome, ApplicationError> {
        self.decide_document(case, actor, WorkflowAction::RequestRevision, Some(notes.into()))
    }

    /// Records the comment and, while a discussion is open, the author as
    /// a forum participant. Posting to a closed forum is refused.
    pub fn post_comment(
        &self,
        case: &mut DocumentCase,
        comment: DocumentComment,
    ) -> Result<(), ApplicationError> {
        if let Some(discussion) = &mut case.discussion {
            if !discussion.open {
                return Err(DomainError::Forbidden(DiscussionError::NotOpen {
                    document_id: case.request.id.0.clone(),
                })
                .into());
            }
            if !comment.is_system {
                discussion.record_participant(&comment.author_role);
            }
        }

        case.comments.push(comment);
        Ok(())
    }

    pub fn close_discussion(
        &self,
        case: &mut DocumentCase,
        actor: &Actor,
        reason: impl Into<String>,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let reason = reason.into();
        let step = FlowStep::from(case.request.status);
        let outcome = self
            .document_flow
            .apply(&step, WorkflowAction::CloseDiscussion, &FlowContext::default())
            .map_err(|error| self.flow_denied(document_ref(case), actor, error))?;

        let keywords = self.resolver.keywords().clone();
        let discussion = case.discussion.as_mut().ok_or_else(|| {
            DomainError::Forbidden(DiscussionError::NotOpen {
                document_id: case.request.id.0.clone(),
            })
        })?;
        discussion.close(actor, &reason, &keywords).map_err(|error| {
            self.audit_denied(document_ref(case), actor, "discussion.close_forbidden");
            DomainError::Forbidden(error)
        })?;

        let mut closing = DocumentComment::system(
            case.request.id.clone(),
            format!("Discussion closed: {reason}"),
        );
        closing.is_forum_closed = true;
        case.comments.push(closing);

        self.commit_document(case, actor, outcome, Some(reason))
    }

    pub fn can_user_approve(&self, actor: &Actor, case: &DocumentCase) -> bool {
        self.resolver.can_approve_document(actor, &case.request)
    }

    /// Percent of the chain completed. A rejected document reports the
    /// rungs it actually cleared.
    pub fn progress(&self, case: &DocumentCase) -> u8 {
        let rungs = 6u32;
        let cleared = match case.request.status {
            DocumentStatus::Draft
            | DocumentStatus::Submitted
            | DocumentStatus::PendingSupervisor => 0,
            DocumentStatus::PendingGm => 1,
            DocumentStatus::PendingLegal => 2,
            DocumentStatus::PendingFinance => 3,
            DocumentStatus::Discussion => 4,
            DocumentStatus::AgreementCreation => 5,
            DocumentStatus::Completed => rungs,
            DocumentStatus::Rejected => approved_count(&case.approvals).min(rungs),
        };
        (cleared * 100 / rungs) as u8
    }

    // ----- agreement overview operations -----

    pub fn submit_agreement(
        &self,
        case: &mut AgreementCase,
        actor: &Actor,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let step = FlowStep::from(case.overview.status);
        if actor.nik != case.overview.requester_nik {
            self.audit_denied(agreement_ref(case), actor, "submit.not_requester");
            return Err(DomainError::Unauthorized { nik: actor.nik.clone(), step }.into());
        }

        let context = FlowContext {
            missing_required_fields: missing_agreement_fields(&case.overview),
        };
        let outcome = self
            .agreement_flow
            .apply(&step, WorkflowAction::Submit, &context)
            .map_err(|error| self.flow_denied(agreement_ref(case), actor, error))?;

        self.commit_agreement(case, actor, outcome, None)
    }

    pub fn approve_agreement(
        &self,
        case: &mut AgreementCase,
        actor: &Actor,
        comments: Option<String>,
    ) -> Result<TransitionOutcome, ApplicationError> {
        self.decide_agreement(case, actor, WorkflowAction::Approve, comments)
    }

    pub fn reject_agreement(
        &self,
        case: &mut AgreementCase,
        actor: &Actor,
        reason: impl Into<String>,
    ) -> Result<TransitionOutcome, ApplicationError> {
        self.decide_agreement(case, actor, WorkflowAction::Reject, Some(reason.into()))
    }

    pub fn request_agreement_revision(
        &self,
        case: &mut AgreementCase,
        actor: &Actor,
        notes: impl Into<String>,
    ) -> Result<TransitionOutcome, ApplicationError> {
        self.decide_agreement(case, actor, WorkflowAction::RequestRevision, Some(notes.into()))
    }

    pub fn can_user_approve_agreement(&self, actor: &Actor, case: &AgreementCase) -> bool {
        self.resolver.can_approve_agreement(actor, &case.overview)
    }

    pub fn agreement_progress(&self, case: &AgreementCase) -> u8 {
        use crate::domain::agreement::AgreementStatus;

        let rungs = 6u32;
        let cleared = match case.overview.status {
            AgreementStatus::Draft | AgreementStatus::PendingHead => 0,
            AgreementStatus::PendingGm => 1,
            AgreementStatus::PendingFinance => 2,
            AgreementStatus::PendingLegal => 3,
            AgreementStatus::PendingDirector1 => 4,
            AgreementStatus::PendingDirector2 => 5,
            AgreementStatus::Approved => rungs,
            AgreementStatus::Rejected => approved_count(&case.approvals).min(rungs),
        };
        (cleared * 100 / rungs) as u8
    }

    // ----- internals -----

    fn decide_document(
        &self,
        case: &mut DocumentCase,
        actor: &Actor,
        action: WorkflowAction,
        comments: Option<String>,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let step = FlowStep::from(case.request.status);

        // Legality first, so a dead-end status reads as InvalidTransition
        // even for actors who would not have been authorized anyway.
        let outcome = self
            .document_flow
            .apply(&step, action, &FlowContext::default())
            .map_err(|error| self.flow_denied(document_ref(case), actor, error))?;

        let rule = self
            .resolver
            .resolve_document(&case.request)
            .map_err(map_resolve_error)?;
        if !rule.matches(actor) {
            self.audit_denied(document_ref(case), actor, "approval.unauthorized");
            return Err(DomainError::Unauthorized { nik: actor.nik.clone(), step }.into());
        }

        self.commit_document(case, actor, outcome, comments)
    }

    fn decide_agreement(
        &self,
        case: &mut AgreementCase,
        actor: &Actor,
        action: WorkflowAction,
        comments: Option<String>,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let step = FlowStep::from(case.overview.status);
        let outcome = self
            .agreement_flow
            .apply(&step, action, &FlowContext::default())
            .map_err(|error| self.flow_denied(agreement_ref(case), actor, error))?;

        let rule = self
            .resolver
            .resolve_agreement(&case.overview)
            .map_err(map_resolve_error)?;
        if !rule.matches(actor) {
            self.audit_denied(agreement_ref(case), actor, "approval.unauthorized");
            return Err(DomainError::Unauthorized { nik: actor.nik.clone(), step }.into());
        }

        self.commit_agreement(case, actor, outcome, comments)
    }

    fn commit_document(
        &self,
        case: &mut DocumentCase,
        actor: &Actor,
        outcome: TransitionOutcome,
        comments: Option<String>,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let next = outcome.to.as_document_status().ok_or_else(|| {
            DomainError::InvariantViolation(format!(
                "step {:?} is not a document status",
                outcome.to
            ))
        })?;
        case.request.transition_to(next).map_err(ApplicationError::from)?;

        let now = Utc::now();
        case.request.updated_at = now;

        for effect in &outcome.effects {
            match effect {
                TransitionEffect::MarkSubmitted => case.request.submitted_at = Some(now),
                TransitionEffect::ClearSubmission => case.request.submitted_at = None,
                TransitionEffect::MarkCompleted => case.request.completed_at = Some(now),
                TransitionEffect::RecordApproval => {
                    let stage = outcome.from.approval_stage().ok_or_else(|| {
                        DomainError::InvariantViolation(format!(
                            "step {:?} has no approval stage",
                            outcome.from
                        ))
                    })?;
                    case.approvals.push(ApprovalRecord::decided(
                        document_ref(case),
                        stage,
                        &actor.nik,
                        &actor.role,
                        decision_for(outcome.action),
                        comments.clone(),
                    ));
                }
                TransitionEffect::OpenDiscussion => {
                    case.discussion = Some(DiscussionState::open(case.request.id.clone()));
                    let keywords = self.resolver.keywords();
                    for group in [&keywords.finance, &keywords.legal] {
                        self.dispatcher.dispatch(Notification::new(
                            WorkflowEvent::DiscussionOpened,
                            document_ref(case),
                            NotificationTarget::RoleMatching { keywords: group.clone() },
                            format!("Discussion opened for document {}", case.request.id.0),
                        ));
                    }
                }
                TransitionEffect::CloseForum => {
                    self.dispatcher.dispatch(Notification::new(
                        WorkflowEvent::DiscussionClosed,
                        document_ref(case),
                        NotificationTarget::Nik { nik: case.request.requester_nik.clone() },
                        format!("Discussion closed for document {}", case.request.id.0),
                    ));
                }
                TransitionEffect::NotifyNextApprover => {
                    match self.resolver.resolve_document(&case.request) {
                        Ok(rule) => self.dispatcher.dispatch(Notification::new(
                            WorkflowEvent::ApprovalRequested,
                            document_ref(case),
                            rule_target(&rule),
                            format!("Document {} awaits your approval", case.request.id.0),
                        )),
                        Err(error) => self.audit_notify_failure(document_ref(case), actor, &error),
                    }
                }
                TransitionEffect::NotifyRequester => {
                    self.dispatcher.dispatch(Notification::new(
                        requester_event(&outcome),
                        document_ref(case),
                        NotificationTarget::Nik { nik: case.request.requester_nik.clone() },
                        format!(
                            "Document {} is now {:?}",
                            case.request.id.0, case.request.status
                        ),
                    ));
                }
            }
        }

        self.audit_applied(document_ref(case), actor, &outcome);
        Ok(outcome)
    }

    fn commit_agreement(
        &self,
        case: &mut AgreementCase,
        actor: &Actor,
        outcome: TransitionOutcome,
        comments: Option<String>,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let next = outcome.to.as_agreement_status().ok_or_else(|| {
            DomainError::InvariantViolation(format!(
                "step {:?} is not an agreement status",
                outcome.to
            ))
        })?;
        case.overview.transition_to(next).map_err(ApplicationError::from)?;

        let now = Utc::now();
        case.overview.updated_at = now;

        for effect in &outcome.effects {
            match effect {
                TransitionEffect::MarkSubmitted => case.overview.submitted_at = Some(now),
                TransitionEffect::ClearSubmission => case.overview.submitted_at = None,
                TransitionEffect::MarkCompleted => case.overview.completed_at = Some(now),
                TransitionEffect::RecordApproval => {
                    let stage = outcome.from.approval_stage().ok_or_else(|| {
                        DomainError::InvariantViolation(format!(
                            "step {:?} has no approval stage",
                            outcome.from
                        ))
                    })?;
                    case.approvals.push(ApprovalRecord::decided(
                        agreement_ref(case),
                        stage,
                        &actor.nik,
                        &actor.role,
                        decision_for(outcome.action),
                        comments.clone(),
                    ));
                }
                TransitionEffect::NotifyNextApprover => {
                    match self.resolver.resolve_agreement(&case.overview) {
                        Ok(rule) => self.dispatcher.dispatch(Notification::new(
                            WorkflowEvent::ApprovalRequested,
                            agreement_ref(case),
                            rule_target(&rule),
                            format!("Agreement {} awaits your approval", case.overview.id.0),
                        )),
                        Err(error) => self.audit_notify_failure(agreement_ref(case), actor, &error),
                    }
                }
                TransitionEffect::NotifyRequester => {
                    self.dispatcher.dispatch(Notification::new(
                        requester_event(&outcome),
                        agreement_ref(case),
                        NotificationTarget::Nik { nik: case.overview.requester_nik.clone() },
                        format!(
                            "Agreement {} is now {:?}",
                            case.overview.id.0, case.overview.status
                        ),
                    ));
                }
                // Agreements have no forum.
                TransitionEffect::OpenDiscussion | TransitionEffect::CloseForum => {}
            }
        }

        self.audit_applied(agreement_ref(case), actor, &outcome);
        Ok(outcome)
    }

    fn flow_denied(
        &self,
        subject: WorkflowRef,
        actor: &Actor,
        error: crate::flows::engine::FlowTransitionError,
    ) -> ApplicationError {
        self.audit.emit(
            AuditEvent::new(
                Some(subject),
                Uuid::new_v4().to_string(),
                "flow.transition_rejected",
                AuditCategory::Flow,
                actor.nik.clone(),
                AuditOutcome::Rejected,
            )
            .with_metadata("error", error.to_string()),
        );
        DomainError::from(error).into()
    }

    fn audit_denied(&self, subject: WorkflowRef, actor: &Actor, event_type: &str) {
        self.audit.emit(AuditEvent::new(
            Some(subject),
            Uuid::new_v4().to_string(),
            event_type,
            AuditCategory::Approval,
            actor.nik.clone(),
            AuditOutcome::Rejected,
        ));
    }

    fn audit_applied(&self, subject: WorkflowRef, actor: &Actor, outcome: &TransitionOutcome) {
        self.audit.emit(
            AuditEvent::new(
                Some(subject),
                Uuid::new_v4().to_string(),
                "flow.transition_applied",
                AuditCategory::Flow,
                actor.nik.clone(),
                AuditOutcome::Success,
            )
            .with_metadata("from", format!("{:?}", outcome.from))
            .with_metadata("to", format!("{:?}", outcome.to))
            .with_metadata("action", format!("{:?}", outcome.action)),
        );
    }

    fn audit_notify_failure(&self, subject: WorkflowRef, actor: &Actor, error: &ResolveError) {
        self.audit.emit(
            AuditEvent::new(
                Some(subject),
                Uuid::new_v4().to_string(),
                "notify.approver_unresolved",
                AuditCategory::System,
                actor.nik.clone(),
                AuditOutcome::Failed,
            )
            .with_metadata("error", error.to_string()),
        );
    }
}

fn document_ref(case: &DocumentCase) -> WorkflowRef {
    WorkflowRef::Document(case.request.id.clone())
}

fn agreement_ref(case: &AgreementCase) -> WorkflowRef {
    WorkflowRef::Agreement(case.overview.id.clone())
}

fn missing_document_fields(request: &DocumentRequest) -> Vec<String> {
    let mut missing = Vec::new();
    if request.title.trim().is_empty() {
        missing.push("title".to_string());
    }
    if request.description.trim().is_empty() {
        missing.push("description".to_string());
    }
    missing
}

fn missing_agreement_fields(overview: &AgreementOverview) -> Vec<String> {
    let mut missing = Vec::new();
    if overview.title.trim().is_empty() {
        missing.push("title".to_string());
    }
    if overview.counterparty.trim().is_empty() {
        missing.push("counterparty".to_string());
    }
    missing
}

fn decision_for(action: WorkflowAction) -> ApprovalDecision {
    match action {
        WorkflowAction::Reject => ApprovalDecision::Rejected,
        _ => ApprovalDecision::Approved,
    }
}

fn requester_event(outcome: &TransitionOutcome) -> WorkflowEvent {
    match outcome.action {
        WorkflowAction::Reject => WorkflowEvent::Rejected,
        WorkflowAction::RequestRevision => WorkflowEvent::RevisionRequested,
        WorkflowAction::CloseDiscussion => WorkflowEvent::DiscussionClosed,
        _ if outcome.to.is_terminal() => WorkflowEvent::Completed,
        _ => WorkflowEvent::Approved,
    }
}

fn rule_target(rule: &ApproverRule) -> NotificationTarget {
    match rule {
        ApproverRule::SpecificNik { nik } => NotificationTarget::Nik { nik: nik.clone() },
        ApproverRule::RoleContains { keywords } => {
            NotificationTarget::RoleMatching { keywords: keywords.clone() }
        }
    }
}

fn map_resolve_error(error: ResolveError) -> ApplicationError {
    match error {
        ResolveError::UnknownDivision { .. } => ApplicationError::Configuration(error.to_string()),
        other => DomainError::InvariantViolation(other.to_string()).into(),
    }
}

fn approved_count(approvals: &[ApprovalRecord]) -> u32 {
    approvals
        .iter()
        .filter(|record| record.decision == ApprovalDecision::Approved)
        .count() as u32
}
