/// Database row types — these map directly to SQLite rows.
/// Distinct from the huddle-types API models to keep the DB layer independent.

pub struct ChannelRow {
    pub id: String,
    pub org_id: String,
    pub name: String,
    pub project_id: Option<String>,
    pub creator_id: String,
    pub is_private: bool,
    pub is_deleted: bool,
    pub deleted_by: Option<String>,
    pub deleted_at: Option<String>,
    pub created_at: String,
    /// Membership set, loaded alongside the channel row
    pub members: Vec<String>,
}

pub struct MessageRow {
    pub id: String,
    pub channel_id: String,
    pub seq: i64,
    pub sender_id: String,
    pub sender_name: String,
    pub body: String,
    pub reply_to: Option<String>,
    pub edited: bool,
    pub deleted: bool,
    pub created_at: String,
}
