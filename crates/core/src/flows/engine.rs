use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::flows::states::{
    FlowContext, FlowKind, FlowStep, TransitionEffect, TransitionOutcome, WorkflowAction,
};

pub trait FlowDefinition {
    fn kind(&self) -> FlowKind;
    fn initial_step(&self) -> FlowStep;
    /// Ordered rungs an approval climbs, ending in the terminal success
    /// step. `Approve` always advances to the next entry.
    fn approval_ladder(&self) -> &'static [FlowStep];
    fn transition(
        &self,
        current: &FlowStep,
        action: WorkflowAction,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("missing required fields before transition from {step:?}: {missing_fields:?}")]
    MissingRequiredFields { step: FlowStep, missing_fields: Vec<String> },
    #[error("invalid transition from {step:?} using action {action:?}")]
    InvalidTransition { step: FlowStep, action: WorkflowAction },
}

/// Approval chain for document requests: supervisor, GM, legal, finance,
/// then the gated discussion and agreement-creation tail.
#[derive(Clone, Debug, Default)]
pub struct DocumentFlow;

const DOCUMENT_LADDER: &[FlowStep] = &[
    FlowStep::PendingSupervisor,
    FlowStep::PendingGm,
    FlowStep::PendingLegal,
    FlowStep::PendingFinance,
    FlowStep::Discussion,
    FlowStep::AgreementCreation,
    FlowStep::Completed,
];

impl FlowDefinition for DocumentFlow {
    fn kind(&self) -> FlowKind {
        FlowKind::DocumentRequest
    }

    fn initial_step(&self) -> FlowStep {
        FlowStep::Draft
    }

    fn approval_ladder(&self) -> &'static [FlowStep] {
        DOCUMENT_LADDER
    }

    fn transition(
        &self,
        current: &FlowStep,
        action: WorkflowAction,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        use TransitionEffect::{
            ClearSubmission, CloseForum, MarkCompleted, MarkSubmitted, NotifyNextApprover,
            NotifyRequester, OpenDiscussion, RecordApproval,
        };

        let (to, effects) = match (current, action) {
            (FlowStep::Draft, WorkflowAction::Submit) => {
                require_fields(current, context)?;
                (FlowStep::PendingSupervisor, vec![MarkSubmitted, NotifyNextApprover])
            }
            // Legacy imports can still sit at Submitted; the supervisor
            // decision is the same rung either way.
            (FlowStep::Submitted, WorkflowAction::Approve) => {
                (FlowStep::PendingGm, vec![RecordApproval, NotifyNextApprover])
            }
            (step, WorkflowAction::Approve) => match next_rung(DOCUMENT_LADDER, step) {
                Some(FlowStep::Discussion) => (
                    FlowStep::Discussion,
                    vec![RecordApproval, OpenDiscussion, NotifyNextApprover],
                ),
                // Discussion is left via CloseDiscussion, never Approve.
                Some(next) if *step != FlowStep::Discussion => {
                    let effects = if next == FlowStep::Completed {
                        vec![RecordApproval, MarkCompleted, NotifyRequester]
                    } else {
                        vec![RecordApproval, NotifyNextApprover]
                    };
                    (next, effects)
                }
                _ => return Err(invalid(current, action)),
            },
            (step, WorkflowAction::Reject) if step.is_pending() => {
                (FlowStep::Rejected, vec![RecordApproval, NotifyRequester])
            }
            (step, WorkflowAction::RequestRevision) if step.is_pending() => {
                (FlowStep::Draft, vec![ClearSubmission, NotifyRequester])
            }
            (FlowStep::Discussion, WorkflowAction::CloseDiscussion) => (
                FlowStep::AgreementCreation,
                vec![RecordApproval, CloseForum, NotifyNextApprover],
            ),
            _ => return Err(invalid(current, action)),
        };

        Ok(TransitionOutcome { from: *current, to, action, effects })
    }
}

/// Approval chain for agreement overviews, ending in the two director
/// sign-offs.
#[derive(Clone, Debug, Default)]
pub struct AgreementFlow;

const AGREEMENT_LADDER: &[FlowStep] = &[
    FlowStep::PendingHead,
    FlowStep::PendingGm,
    FlowStep::PendingFinance,
    FlowStep::PendingLegal,
    FlowStep::PendingDirector1,
    FlowStep::PendingDirector2,
    FlowStep::Approved,
];

impl FlowDefinition for AgreementFlow {
    fn kind(&self) -> FlowKind {
        FlowKind::Agreement
    }

    fn initial_step(&self) -> FlowStep {
        FlowStep::Draft
    }

    fn approval_ladder(&self) -> &'static [FlowStep] {
        AGREEMENT_LADDER
    }

    fn transition(
        &self,
        current: &FlowStep,
        action: WorkflowAction,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        use TransitionEffect::{
            ClearSubmission, MarkCompleted, MarkSubmitted, NotifyNextApprover, NotifyRequester,
            RecordApproval,
        };

        let (to, effects) = match (current, action) {
            (FlowStep::Draft, WorkflowAction::Submit) => {
                require_fields(current, context)?;
                (FlowStep::PendingHead, vec![MarkSubmitted, NotifyNextApprover])
            }
            (step, WorkflowAction::Approve) => match next_rung(AGREEMENT_LADDER, step) {
                Some(next) => {
                    let effects = if next == FlowStep::Approved {
                        vec![RecordApproval, MarkCompleted, NotifyRequester]
                    } else {
                        vec![RecordApproval, NotifyNextApprover]
                    };
                    (next, effects)
                }
                None => return Err(invalid(current, action)),
            },
            (step, WorkflowAction::Reject) if step.is_pending() => {
                (FlowStep::Rejected, vec![RecordApproval, NotifyRequester])
            }
            (step, WorkflowAction::RequestRevision) if step.is_pending() => {
                (FlowStep::Draft, vec![ClearSubmission, NotifyRequester])
            }
            _ => return Err(invalid(current, action)),
        };

        Ok(TransitionOutcome { from: *current, to, action, effects })
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn kind(&self) -> FlowKind {
        self.flow.kind()
    }

    pub fn initial_step(&self) -> FlowStep {
        self.flow.initial_step()
    }

    pub fn approval_ladder(&self) -> &'static [FlowStep] {
        self.flow.approval_ladder()
    }

    pub fn apply(
        &self,
        current: &FlowStep,
        action: WorkflowAction,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, action, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &FlowStep,
        action: WorkflowAction,
        context: &FlowContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink,
    {
        let result = self.apply(current, action, context);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit.subject.clone(),
                        audit.correlation_id.clone(),
                        "flow.transition_applied",
                        AuditCategory::Flow,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", format!("{:?}", outcome.from))
                    .with_metadata("to", format!("{:?}", outcome.to))
                    .with_metadata("action", format!("{:?}", outcome.action)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit.subject.clone(),
                        audit.correlation_id.clone(),
                        "flow.transition_rejected",
                        AuditCategory::Flow,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Default for FlowEngine<DocumentFlow> {
    fn default() -> Self {
        Self::new(DocumentFlow)
    }
}

impl Default for FlowEngine<AgreementFlow> {
    fn default() -> Self {
        Self::new(AgreementFlow)
    }
}

fn next_rung(ladder: &[FlowStep], current: &FlowStep) -> Option<FlowStep> {
    let position = ladder.iter().position(|step| step == current)?;
    ladder.get(position + 1).copied()
}

fn require_fields(current: &FlowStep, context: &FlowContext) -> Result<(), FlowTransitionError> {
    if context.missing_required_fields.is_empty() {
        return Ok(());
    }

    Err(FlowTransitionError::MissingRequiredFields {
        step: *current,
        missing_fields: context.missing_required_fields.clone(),
    })
}

fn invalid(current: &FlowStep, action: WorkflowAction) -> FlowTransitionError {
    FlowTransitionError::InvalidTransition { step: *current, action }
}

#[cfg(test)]
mod tests {
    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::domain::document::DocumentId;
    use crate::domain::WorkflowRef;
    use crate::flows::engine::{
        AgreementFlow, DocumentFlow, FlowDefinition, FlowEngine, FlowTransitionError,
    };
    use crate::flows::states::{
        FlowContext, FlowKind, FlowStep, TransitionEffect, WorkflowAction,
    };

    #[test]
    fn document_flow_happy_path_reaches_completed() {
        let engine = FlowEngine::new(DocumentFlow);
        let context = FlowContext::default();
        let mut step = engine.initial_step();

        step = engine
            .apply(&step, WorkflowAction::Submit, &context)
            .expect("draft -> pending_supervisor")
            .to;
        assert_eq!(step, FlowStep::PendingSupervisor);

        for expected in [
            FlowStep::PendingGm,
            FlowStep::PendingLegal,
            FlowStep::PendingFinance,
            FlowStep::Discussion,
        ] {
            step = engine.apply(&step, WorkflowAction::Approve, &context).expect("advance").to;
            assert_eq!(step, expected);
        }

        let closed = engine
            .apply(&step, WorkflowAction::CloseDiscussion, &context)
            .expect("discussion -> agreement_creation");
        assert_eq!(closed.to, FlowStep::AgreementCreation);
        assert!(closed.effects.contains(&TransitionEffect::CloseForum));

        let done = engine
            .apply(&closed.to, WorkflowAction::Approve, &context)
            .expect("agreement_creation -> completed");
        assert_eq!(done.to, FlowStep::Completed);
        assert!(done.effects.contains(&TransitionEffect::MarkCompleted));
    }

    #[test]
    fn entering_discussion_emits_open_effect() {
        let engine = FlowEngine::<DocumentFlow>::default();
        let outcome = engine
            .apply(&FlowStep::PendingFinance, WorkflowAction::Approve, &FlowContext::default())
            .expect("finance approve");
        assert_eq!(outcome.to, FlowStep::Discussion);
        assert!(outcome.effects.contains(&TransitionEffect::OpenDiscussion));
    }

    #[test]
    fn discussion_cannot_be_left_by_plain_approve() {
        let engine = FlowEngine::<DocumentFlow>::default();
        let error = engine
            .apply(&FlowStep::Discussion, WorkflowAction::Approve, &FlowContext::default())
            .expect_err("approve is not a discussion exit");
        assert!(matches!(error, FlowTransitionError::InvalidTransition { .. }));
    }

    #[test]
    fn reject_is_legal_from_every_pending_step() {
        let engine = FlowEngine::<DocumentFlow>::default();
        for step in [
            FlowStep::Submitted,
            FlowStep::PendingSupervisor,
            FlowStep::PendingGm,
            FlowStep::PendingLegal,
            FlowStep::PendingFinance,
        ] {
            let outcome = engine
                .apply(&step, WorkflowAction::Reject, &FlowContext::default())
                .expect("pending -> rejected");
            assert_eq!(outcome.to, FlowStep::Rejected);
        }
    }

    #[test]
    fn revision_clears_submission_and_returns_to_draft() {
        let engine = FlowEngine::<DocumentFlow>::default();
        let outcome = engine
            .apply(&FlowStep::PendingLegal, WorkflowAction::RequestRevision, &FlowContext::default())
            .expect("pending_legal -> draft");
        assert_eq!(outcome.to, FlowStep::Draft);
        assert!(outcome.effects.contains(&TransitionEffect::ClearSubmission));
    }

    #[test]
    fn submit_with_missing_fields_is_rejected() {
        let engine = FlowEngine::<DocumentFlow>::default();
        let error = engine
            .apply(
                &FlowStep::Draft,
                WorkflowAction::Submit,
                &FlowContext {
                    missing_required_fields: vec!["title".to_owned(), "description".to_owned()],
                },
            )
            .expect_err("must reject missing fields");
        assert!(matches!(error, FlowTransitionError::MissingRequiredFields { .. }));
    }

    #[test]
    fn terminal_steps_admit_no_action() {
        let engine = FlowEngine::<DocumentFlow>::default();
        for step in [FlowStep::Completed, FlowStep::Rejected] {
            for action in [
                WorkflowAction::Submit,
                WorkflowAction::Approve,
                WorkflowAction::Reject,
                WorkflowAction::RequestRevision,
                WorkflowAction::CloseDiscussion,
            ] {
                assert!(engine.apply(&step, action, &FlowContext::default()).is_err());
            }
        }
    }

    #[test]
    fn agreement_flow_walks_both_directors() {
        let engine = FlowEngine::new(AgreementFlow);
        let context = FlowContext::default();
        let mut step = engine
            .apply(&FlowStep::Draft, WorkflowAction::Submit, &context)
            .expect("draft -> pending_head")
            .to;

        for expected in [
            FlowStep::PendingGm,
            FlowStep::PendingFinance,
            FlowStep::PendingLegal,
            FlowStep::PendingDirector1,
            FlowStep::PendingDirector2,
            FlowStep::Approved,
        ] {
            step = engine.apply(&step, WorkflowAction::Approve, &context).expect("advance").to;
            assert_eq!(step, expected);
        }
        assert_eq!(engine.kind(), FlowKind::Agreement);
    }

    #[test]
    fn rejected_agreement_cannot_be_approved_again() {
        let engine = FlowEngine::<AgreementFlow>::default();
        let rejected = engine
            .apply(&FlowStep::PendingDirector1, WorkflowAction::Reject, &FlowContext::default())
            .expect("director1 reject")
            .to;
        assert_eq!(rejected, FlowStep::Rejected);

        let error = engine
            .apply(&rejected, WorkflowAction::Approve, &FlowContext::default())
            .expect_err("rejected is terminal");
        assert!(matches!(
            error,
            FlowTransitionError::InvalidTransition { step: FlowStep::Rejected, .. }
        ));
    }

    #[test]
    fn replay_is_deterministic_for_same_action_sequence() {
        let engine = FlowEngine::<DocumentFlow>::default();
        let actions = [
            WorkflowAction::Submit,
            WorkflowAction::Approve,
            WorkflowAction::Approve,
            WorkflowAction::Approve,
            WorkflowAction::Approve,
        ];

        let run = || {
            let mut step = engine.initial_step();
            let mut effects = Vec::new();
            for action in actions {
                let outcome =
                    engine.apply(&step, action, &FlowContext::default()).expect("deterministic");
                effects.push(outcome.effects.clone());
                step = outcome.to;
            }
            (step, effects)
        };

        assert_eq!(run(), run());
        assert_eq!(DocumentFlow.kind(), FlowKind::DocumentRequest);
    }

    #[test]
    fn flow_transition_emits_audit_event() {
        let engine = FlowEngine::<DocumentFlow>::default();
        let sink = InMemoryAuditSink::default();

        let _ = engine
            .apply_with_audit(
                &FlowStep::Draft,
                WorkflowAction::Submit,
                &FlowContext::default(),
                &sink,
                &AuditContext::new(
                    Some(WorkflowRef::Document(DocumentId("DR-2026-0009".to_owned()))),
                    "req-42",
                    "workflow-engine",
                ),
            )
            .expect("transition should succeed");

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].correlation_id, "req-42");
        assert_eq!(events[0].event_type, "flow.transition_applied");
    }

    #[test]
    fn rejected_transition_emits_rejected_audit_event() {
        let engine = FlowEngine::<DocumentFlow>::default();
        let sink = InMemoryAuditSink::default();

        let _ = engine.apply_with_audit(
            &FlowStep::Completed,
            WorkflowAction::Approve,
            &FlowContext::default(),
            &sink,
            &AuditContext::new(None, "req-43", "workflow-engine"),
        );

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "flow.transition_rejected");
    }
}
