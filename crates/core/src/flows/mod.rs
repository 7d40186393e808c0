pub mod engine;
pub mod states;

pub use engine::{AgreementFlow, DocumentFlow, FlowDefinition, FlowEngine, FlowTransitionError};
pub use states::{FlowContext, FlowKind, FlowStep, TransitionEffect, TransitionOutcome, WorkflowAction};
