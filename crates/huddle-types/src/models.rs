use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A channel as exposed by the directory. Soft-deleted channels keep their
/// row (and message history) forever; `is_deleted` gates new writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub project_id: Option<Uuid>,
    pub creator_id: Uuid,
    pub members: Vec<Uuid>,
    pub is_private: bool,
    pub is_deleted: bool,
    pub deleted_by: Option<Uuid>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A message populated for clients: sender identity resolved, reply target
/// inlined, read-by set attached. The read-by set only ever grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub body: String,
    pub reply_to: Option<ReplyPreview>,
    pub read_by: Vec<Uuid>,
    pub edited: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Inline preview of the message a reply points at. Always in the same
/// channel as the replying message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyPreview {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub body: String,
}
