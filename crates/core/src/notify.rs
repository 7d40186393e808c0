use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::WorkflowRef;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEvent {
    ApprovalRequested,
    Approved,
    Rejected,
    RevisionRequested,
    DiscussionOpened,
    DiscussionClosed,
    Completed,
}

/// Who a notification is addressed to. Role targets are resolved to
/// concrete users by the delivery side, which owns the directory lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationTarget {
    Nik { nik: String },
    RoleMatching { keywords: Vec<String> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub event: WorkflowEvent,
    pub subject: WorkflowRef,
    pub target: NotificationTarget,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        event: WorkflowEvent,
        subject: WorkflowRef,
        target: NotificationTarget,
        message: impl Into<String>,
    ) -> Self {
        Self { event, subject, target, message: message.into(), occurred_at: Utc::now() }
    }
}

/// Emission boundary. The engine produces events; email, in-app rows and
/// push delivery all live behind this trait.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, notification: Notification);
}

#[derive(Clone, Default)]
pub struct InMemoryDispatcher {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryDispatcher {
    pub fn sent(&self) -> Vec<Notification> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl NotificationDispatcher for InMemoryDispatcher {
    fn dispatch(&self, notification: Notification) {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::document::DocumentId;
    use crate::domain::WorkflowRef;
    use crate::notify::{
        InMemoryDispatcher, Notification, NotificationDispatcher, NotificationTarget,
        WorkflowEvent,
    };

    #[test]
    fn in_memory_dispatcher_collects_notifications() {
        let dispatcher = InMemoryDispatcher::default();
        dispatcher.dispatch(Notification::new(
            WorkflowEvent::ApprovalRequested,
            WorkflowRef::Document(DocumentId("DR-1".to_owned())),
            NotificationTarget::Nik { nik: "20001".to_owned() },
            "Document DR-1 awaits your approval",
        ));

        let sent = dispatcher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event, WorkflowEvent::ApprovalRequested);
        assert_eq!(sent[0].target, NotificationTarget::Nik { nik: "20001".to_owned() });
    }
}
