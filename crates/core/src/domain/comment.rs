use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::document::DocumentId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommentId(pub String);

/// Threaded forum comment attached to a document request. `parent_id` is
/// `None` for top-level posts. Attachments are opaque storage paths.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentComment {
    pub id: CommentId,
    pub document_id: DocumentId,
    pub parent_id: Option<CommentId>,
    pub author_nik: String,
    pub author_role: String,
    pub body: String,
    pub is_forum_closed: bool,
    pub is_system: bool,
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl DocumentComment {
    pub fn new(
        document_id: DocumentId,
        parent_id: Option<CommentId>,
        author_nik: impl Into<String>,
        author_role: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: CommentId(uuid::Uuid::new_v4().to_string()),
            document_id,
            parent_id,
            author_nik: author_nik.into(),
            author_role: author_role.into(),
            body: body.into(),
            is_forum_closed: false,
            is_system: false,
            attachments: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn system(document_id: DocumentId, body: impl Into<String>) -> Self {
        let mut comment = Self::new(document_id, None, "system", "system", body);
        comment.is_system = true;
        comment
    }

    pub fn with_attachment(mut self, path: impl Into<String>) -> Self {
        self.attachments.push(path.into());
        self
    }
}
