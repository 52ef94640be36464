//! Row → API model conversion. Corrupt stored ids or timestamps are logged
//! and mapped to defaults rather than failing a whole page of history.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use huddle_db::models::{ChannelRow, MessageRow};
use huddle_types::models::{Channel, MessageView, ReplyPreview};

pub(crate) fn parse_uuid(s: &str, what: &str) -> Uuid {
    s.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, s, e);
        Uuid::default()
    })
}

pub(crate) fn parse_ts(s: &str) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') default has no timezone suffix;
            // parse as naive UTC and convert.
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", s, e);
            DateTime::default()
        })
}

pub(crate) fn channel_from_row(row: ChannelRow) -> Channel {
    Channel {
        id: parse_uuid(&row.id, "channel id"),
        org_id: parse_uuid(&row.org_id, "org id"),
        name: row.name,
        project_id: row.project_id.as_deref().map(|p| parse_uuid(p, "project id")),
        creator_id: parse_uuid(&row.creator_id, "creator id"),
        members: row
            .members
            .iter()
            .map(|m| parse_uuid(m, "member id"))
            .collect(),
        is_private: row.is_private,
        is_deleted: row.is_deleted,
        deleted_by: row.deleted_by.as_deref().map(|d| parse_uuid(d, "deleted_by")),
        deleted_at: row.deleted_at.as_deref().map(parse_ts),
        created_at: parse_ts(&row.created_at),
    }
}

pub(crate) fn preview_from_row(row: &MessageRow) -> ReplyPreview {
    ReplyPreview {
        id: parse_uuid(&row.id, "message id"),
        sender_id: parse_uuid(&row.sender_id, "sender id"),
        sender_name: row.sender_name.clone(),
        body: row.body.clone(),
    }
}

pub(crate) fn view_from_row(
    row: MessageRow,
    read_by: Vec<Uuid>,
    reply_to: Option<ReplyPreview>,
) -> MessageView {
    MessageView {
        id: parse_uuid(&row.id, "message id"),
        channel_id: parse_uuid(&row.channel_id, "channel id"),
        sender_id: parse_uuid(&row.sender_id, "sender id"),
        sender_name: row.sender_name,
        body: row.body,
        reply_to,
        read_by,
        edited: row.edited,
        deleted: row.deleted,
        created_at: parse_ts(&row.created_at),
    }
}
