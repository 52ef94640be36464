use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// JWT claims shared by huddle-api (REST middleware) and huddle-gateway
/// (WebSocket upgrade). Tokens are minted by the external identity provider;
/// this backend only validates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Authenticated user id
    pub sub: Uuid,
    /// Display name, carried into messages and typing events
    pub name: String,
    /// Organization scope for every directory query
    pub org: Uuid,
    pub exp: usize,
}

// -- Channels --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChannelRequest {
    pub name: String,
    #[serde(default)]
    pub members: Vec<Uuid>,
    #[serde(default)]
    pub is_private: bool,
    pub project_id: Option<Uuid>,
}

/// Partial update for channel metadata. Absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelPatch {
    pub name: Option<String>,
    pub members: Option<Vec<Uuid>>,
    pub is_private: Option<bool>,
    pub project_id: Option<Uuid>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub body: String,
    pub reply_to: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditMessageRequest {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor-based pagination — pass the `created_at` of the oldest message
    /// from the previous page to fetch older messages.
    pub before: Option<String>,
}

fn default_limit() -> u32 {
    50
}

// -- Read state --

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadResponse {
    /// Messages newly marked read by this call (0 on repeat calls)
    pub marked: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub unread: u64,
}
