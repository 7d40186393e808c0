pub mod approvals;
pub mod audit;
pub mod config;
pub mod discussion;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod notify;
pub mod service;

pub use approvals::{ApproverRule, ChainResolver, DivisionChain, ResolveError, RoleKeywords};
pub use audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink,
};
pub use config::{ConfigError, ConfigOverrides, LoadOptions, WorkflowConfig};
pub use discussion::{DiscussionError, DiscussionState};
pub use domain::agreement::{AgreementId, AgreementOverview, AgreementStatus};
pub use domain::approval::{ApprovalDecision, ApprovalId, ApprovalRecord, ApprovalStage};
pub use domain::comment::{CommentId, DocumentComment};
pub use domain::document::{DocumentId, DocumentRequest, DocumentStatus, Priority};
pub use domain::user::Actor;
pub use domain::WorkflowRef;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::engine::{
    AgreementFlow, DocumentFlow, FlowDefinition, FlowEngine, FlowTransitionError,
};
pub use flows::states::{
    FlowContext, FlowKind, FlowStep, TransitionEffect, TransitionOutcome, WorkflowAction,
};
pub use notify::{
    InMemoryDispatcher, Notification, NotificationDispatcher, NotificationTarget, WorkflowEvent,
};
pub use service::{AgreementCase, DocumentCase, WorkflowService};
