//! Read-State Tracker & Unread Aggregator.
//!
//! Read-by sets only grow; the unread total is a query-time re-scan, never a
//! stored counter. A send racing a mark-read may land on either side of it —
//! the contract is eventually accurate, and clients reconcile by calling
//! `unread_count` again.

use uuid::Uuid;

use crate::error::Result;
use crate::{Actor, ChatService};

impl ChatService {
    /// Acknowledge every message in the channel the actor has not read and
    /// did not send. Idempotent: a second call marks nothing new.
    pub async fn mark_read(&self, actor: &Actor, channel_id: Uuid) -> Result<u64> {
        let channel = self.load_channel_row(channel_id).await?;
        self.check_org(actor, &channel)?;
        self.check_membership(actor, &channel)?;

        let cid = channel_id.to_string();
        let user = actor.user_id.to_string();
        self.with_db(move |db| db.mark_read(&cid, &user)).await
    }

    /// Total unread across every channel the actor can access: messages not
    /// sent by them and missing from their read-by sets. Recomputed in full
    /// on each call.
    pub async fn unread_count(&self, actor: &Actor) -> Result<u64> {
        let org = actor.org_id.to_string();
        let user = actor.user_id.to_string();
        self.with_db(move |db| db.unread_count(&org, &user)).await
    }
}
