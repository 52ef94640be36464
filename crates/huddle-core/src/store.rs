//! Message Store: append, edit, tombstone, history. Sends to one channel are
//! a single logical writer — the per-channel lock is held from validation
//! through persist and fan-out, so acceptance order is persist order is
//! broadcast order.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use huddle_db::models::MessageRow;
use huddle_types::events::ServerEvent;
use huddle_types::models::{MessageView, ReplyPreview};

use crate::convert::{parse_uuid, preview_from_row, view_from_row};
use crate::error::{ChatError, Result};
use crate::{Actor, ChatService};

impl ChatService {
    pub async fn send_message(
        &self,
        actor: &Actor,
        channel_id: Uuid,
        body: &str,
        reply_to: Option<Uuid>,
    ) -> Result<MessageView> {
        let body = body.trim().to_string();
        if body.is_empty() {
            return Err(ChatError::Validation("message body is empty".into()));
        }

        // Single-writer section for this channel
        let _guard = self.locks.acquire(channel_id).await;

        let channel = self.load_channel_row(channel_id).await?;
        if channel.is_deleted {
            return Err(ChatError::NotFound("channel"));
        }
        self.check_org(actor, &channel)?;
        self.check_membership(actor, &channel)?;

        // Resolve the reply target before writing anything
        let reply_preview = match reply_to {
            Some(reply_id) => Some(self.resolve_reply(channel_id, reply_id).await?),
            None => None,
        };

        let id = Uuid::new_v4();
        let created_at = Utc::now();
        {
            let id_s = id.to_string();
            let cid = channel_id.to_string();
            let sender = actor.user_id.to_string();
            let sender_name = actor.name.clone();
            let body = body.clone();
            let reply = reply_to.map(|r| r.to_string());
            let at = created_at.to_rfc3339();
            self.with_db(move |db| {
                db.insert_message(&id_s, &cid, &sender, &sender_name, &body, reply.as_deref(), &at)
            })
            .await?;
        }

        let view = MessageView {
            id,
            channel_id,
            sender_id: actor.user_id,
            sender_name: actor.name.clone(),
            body,
            reply_to: reply_preview,
            read_by: vec![actor.user_id],
            edited: false,
            deleted: false,
            created_at,
        };

        // Committed: fan out. Room gets the populated message, everyone gets
        // the unread-count notification.
        self.router()
            .room(
                channel_id,
                ServerEvent::ReceiveMessage {
                    message: view.clone(),
                },
                None,
            )
            .await;
        self.router()
            .global(ServerEvent::NewMessageGlobal {
                channel_id,
                sender_id: actor.user_id,
                message: view.clone(),
            })
            .await;
        self.notifier.message_sent(&view);

        Ok(view)
    }

    /// Replace a message body. Sender only; room-scoped broadcast only
    /// (edits do not change unread counts).
    pub async fn edit_message(
        &self,
        actor: &Actor,
        message_id: Uuid,
        body: &str,
    ) -> Result<MessageView> {
        let body = body.trim().to_string();
        if body.is_empty() {
            return Err(ChatError::Validation("message body is empty".into()));
        }

        let row = self.load_message_row(message_id).await?;
        if row.deleted {
            return Err(ChatError::NotFound("message"));
        }
        if row.sender_id != actor.user_id.to_string() {
            return Err(ChatError::Forbidden("only the sender may edit".into()));
        }
        let channel_id = parse_uuid(&row.channel_id, "channel id");
        let channel = self.load_channel_row(channel_id).await?;
        if channel.is_deleted {
            return Err(ChatError::NotFound("channel"));
        }
        self.check_org(actor, &channel)?;

        let (updated, reads, reply_row) = {
            let id_s = message_id.to_string();
            let body = body.clone();
            let reply_id = row.reply_to.clone();
            self.with_db(move |db| {
                db.set_message_body(&id_s, &body)?;
                let updated = db
                    .get_message(&id_s)?
                    .ok_or_else(|| anyhow::anyhow!("message vanished mid-edit: {}", id_s))?;
                let reads = db.reads_for_messages(std::slice::from_ref(&id_s))?;
                let reply = match reply_id {
                    Some(r) => db.get_message(&r)?,
                    None => None,
                };
                Ok((updated, reads, reply))
            })
            .await?
        };

        let read_by = reads
            .iter()
            .map(|(_, user)| parse_uuid(user, "reader id"))
            .collect();
        let view = view_from_row(updated, read_by, reply_row.as_ref().map(preview_from_row));

        self.router()
            .room(
                channel_id,
                ServerEvent::MessageEdited {
                    message: view.clone(),
                },
                None,
            )
            .await;

        Ok(view)
    }

    /// Tombstone a message. Sender only; the row (and its read state) stays,
    /// the body is cleared. Room-scoped broadcast only.
    pub async fn delete_message(&self, actor: &Actor, message_id: Uuid) -> Result<Uuid> {
        let row = self.load_message_row(message_id).await?;
        if row.deleted {
            return Err(ChatError::NotFound("message"));
        }
        if row.sender_id != actor.user_id.to_string() {
            return Err(ChatError::Forbidden("only the sender may delete".into()));
        }
        let channel_id = parse_uuid(&row.channel_id, "channel id");
        let channel = self.load_channel_row(channel_id).await?;
        if channel.is_deleted {
            return Err(ChatError::NotFound("channel"));
        }
        self.check_org(actor, &channel)?;

        let id_s = message_id.to_string();
        self.with_db(move |db| db.tombstone_message(&id_s)).await?;

        self.router()
            .room(
                channel_id,
                ServerEvent::MessageDeleted {
                    message_id,
                    channel_id,
                },
                None,
            )
            .await;

        Ok(channel_id)
    }

    /// Channel history, newest first. Readable for soft-deleted channels —
    /// deletion blocks new writes, not reads.
    pub async fn list_messages(
        &self,
        actor: &Actor,
        channel_id: Uuid,
        limit: u32,
        before: Option<String>,
    ) -> Result<Vec<MessageView>> {
        let channel = self.load_channel_row(channel_id).await?;
        self.check_org(actor, &channel)?;
        self.check_membership(actor, &channel)?;

        let limit = limit.min(200);
        let (rows, reads, replies) = {
            let cid = channel_id.to_string();
            self.with_db(move |db| {
                let rows = db.list_messages(&cid, limit, before.as_deref())?;
                let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
                let reads = db.reads_for_messages(&ids)?;

                let mut replies: HashMap<String, MessageRow> = HashMap::new();
                for row in &rows {
                    if let Some(reply_id) = &row.reply_to {
                        if !replies.contains_key(reply_id) {
                            if let Some(target) = db.get_message(reply_id)? {
                                replies.insert(reply_id.clone(), target);
                            }
                        }
                    }
                }
                Ok((rows, reads, replies))
            })
            .await?
        };

        // Group read-by sets by message id
        let mut read_map: HashMap<String, Vec<Uuid>> = HashMap::new();
        for (message_id, user_id) in &reads {
            read_map
                .entry(message_id.clone())
                .or_default()
                .push(parse_uuid(user_id, "reader id"));
        }

        let views = rows
            .into_iter()
            .map(|row| {
                let read_by = read_map.remove(&row.id).unwrap_or_default();
                let reply = row
                    .reply_to
                    .as_ref()
                    .and_then(|rid| replies.get(rid))
                    .map(preview_from_row);
                view_from_row(row, read_by, reply)
            })
            .collect();

        Ok(views)
    }

    async fn resolve_reply(&self, channel_id: Uuid, reply_id: Uuid) -> Result<ReplyPreview> {
        let row = self
            .load_message_row(reply_id)
            .await
            .map_err(|e| match e {
                ChatError::NotFound(_) => {
                    ChatError::Validation("reply target does not exist".into())
                }
                other => other,
            })?;
        if row.channel_id != channel_id.to_string() {
            return Err(ChatError::Validation(
                "reply target is in a different channel".into(),
            ));
        }
        Ok(preview_from_row(&row))
    }

    pub(crate) async fn load_message_row(&self, message_id: Uuid) -> Result<MessageRow> {
        let id_s = message_id.to_string();
        self.with_db(move |db| db.get_message(&id_s))
            .await?
            .ok_or(ChatError::NotFound("message"))
    }
}
