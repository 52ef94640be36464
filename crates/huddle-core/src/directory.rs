//! Channel Directory: metadata, membership, soft-delete lifecycle.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use huddle_db::models::ChannelRow;
use huddle_types::api::{ChannelPatch, CreateChannelRequest};
use huddle_types::events::ServerEvent;
use huddle_types::models::Channel;

use crate::convert::channel_from_row;
use crate::error::{ChatError, Result};
use crate::{Actor, ChatService};

impl ChatService {
    pub async fn create_channel(
        &self,
        actor: &Actor,
        req: CreateChannelRequest,
    ) -> Result<Channel> {
        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(ChatError::Validation("channel name is empty".into()));
        }

        // Creator is always a member
        let mut members: Vec<String> = req.members.iter().map(Uuid::to_string).collect();
        let creator = actor.user_id.to_string();
        if !members.contains(&creator) {
            members.push(creator);
        }

        let id = Uuid::new_v4();
        let id_s = id.to_string();
        let org = actor.org_id.to_string();
        let creator_id = actor.user_id.to_string();
        let project = req.project_id.map(|p| p.to_string());
        let created_at = Utc::now().to_rfc3339();

        let row = self
            .with_db(move |db| {
                db.create_channel(
                    &id_s,
                    &org,
                    &name,
                    project.as_deref(),
                    &creator_id,
                    &members,
                    req.is_private,
                    &created_at,
                )?;
                db.get_channel(&id_s)
            })
            .await?
            .ok_or(ChatError::NotFound("channel"))?;

        info!("channel {} created by {}", id, actor.user_id);
        Ok(channel_from_row(row))
    }

    pub async fn list_channels(&self, actor: &Actor) -> Result<Vec<Channel>> {
        let org = actor.org_id.to_string();
        let user = actor.user_id.to_string();
        let rows = self.with_db(move |db| db.list_channels(&org, &user)).await?;
        Ok(rows.into_iter().map(channel_from_row).collect())
    }

    /// Patch channel metadata. Any org member may update (last-write-wins,
    /// no versioning); a global `channel_edited` broadcast follows so every
    /// client's channel list stays in sync.
    pub async fn update_channel(
        &self,
        actor: &Actor,
        channel_id: Uuid,
        patch: ChannelPatch,
    ) -> Result<Channel> {
        let current = self.load_channel_row(channel_id).await?;
        if current.is_deleted {
            return Err(ChatError::NotFound("channel"));
        }
        self.check_org(actor, &current)?;

        let name = match patch.name {
            Some(name) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(ChatError::Validation("channel name is empty".into()));
                }
                name
            }
            None => current.name.clone(),
        };
        let is_private = patch.is_private.unwrap_or(current.is_private);
        let project = patch
            .project_id
            .map(|p| p.to_string())
            .or(current.project_id.clone());
        let members: Option<Vec<String>> = patch
            .members
            .map(|m| m.iter().map(Uuid::to_string).collect());

        let id_s = channel_id.to_string();
        let row = self
            .with_db(move |db| {
                db.update_channel(&id_s, &name, project.as_deref(), is_private, members.as_deref())?;
                db.get_channel(&id_s)
            })
            .await?
            .ok_or(ChatError::NotFound("channel"))?;

        let channel = channel_from_row(row);
        self.router()
            .global(ServerEvent::ChannelEdited {
                channel: channel.clone(),
            })
            .await;

        Ok(channel)
    }

    /// Soft delete: the channel stops accepting messages, history stays
    /// readable by prior members, and every connected socket hears about it
    /// (global scope keeps client channel lists consistent without
    /// per-member targeting).
    pub async fn delete_channel(&self, actor: &Actor, channel_id: Uuid) -> Result<()> {
        let current = self.load_channel_row(channel_id).await?;
        if current.is_deleted {
            return Err(ChatError::NotFound("channel"));
        }
        self.check_org(actor, &current)?;

        let id_s = channel_id.to_string();
        let by = actor.user_id.to_string();
        let at = Utc::now().to_rfc3339();
        let deleted = self
            .with_db(move |db| db.soft_delete_channel(&id_s, &by, &at))
            .await?;
        if !deleted {
            return Err(ChatError::NotFound("channel"));
        }

        info!("channel {} soft-deleted by {}", channel_id, actor.user_id);

        // Nothing room-scoped may originate from the channel after this:
        // tear down every connection's room subscription before announcing.
        self.registry().evict_channel(channel_id).await;
        self.router()
            .global(ServerEvent::ChannelDeleted { channel_id })
            .await;

        Ok(())
    }

    /// Room-join authorization: the channel must exist, be live, belong to
    /// the actor's org, and — when private — count the actor as a member.
    pub async fn authorize_join(&self, actor: &Actor, channel_id: Uuid) -> Result<()> {
        let row = self.load_channel_row(channel_id).await?;
        if row.is_deleted {
            return Err(ChatError::NotFound("channel"));
        }
        self.check_org(actor, &row)?;
        self.check_membership(actor, &row)?;
        Ok(())
    }

    pub(crate) async fn load_channel_row(&self, channel_id: Uuid) -> Result<ChannelRow> {
        let id_s = channel_id.to_string();
        self.with_db(move |db| db.get_channel(&id_s))
            .await?
            .ok_or(ChatError::NotFound("channel"))
    }

    /// A channel outside the caller's org scope is indistinguishable from a
    /// missing one.
    pub(crate) fn check_org(&self, actor: &Actor, row: &ChannelRow) -> Result<()> {
        if row.org_id != actor.org_id.to_string() {
            return Err(ChatError::NotFound("channel"));
        }
        Ok(())
    }

    pub(crate) fn check_membership(&self, actor: &Actor, row: &ChannelRow) -> Result<()> {
        if row.is_private && !row.members.contains(&actor.user_id.to_string()) {
            return Err(ChatError::Forbidden(
                "not a member of this private channel".into(),
            ));
        }
        Ok(())
    }
}
