use tracing::warn;
use uuid::Uuid;

use huddle_types::events::ServerEvent;

use crate::registry::{ConnId, ConnectionRegistry};

/// Fans server events out to live connections. Two delivery scopes:
/// room-scoped (connections that joined the channel) and global (every
/// connected socket, regardless of membership).
///
/// Delivery is best effort: a send to a closed connection is logged and
/// skipped, the durable mutation behind the event is already committed and
/// clients resynchronize through history and unread-count queries.
#[derive(Clone)]
pub struct BroadcastRouter {
    registry: ConnectionRegistry,
}

impl BroadcastRouter {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// Deliver to every connection whose joined-room set contains the
    /// channel. `except` skips the originating connection (typing events).
    pub async fn room(&self, channel_id: Uuid, event: ServerEvent, except: Option<ConnId>) {
        let conns = self.registry.map().read().await;
        for (&conn_id, entry) in conns.iter() {
            if !entry.joined.contains(&channel_id) {
                continue;
            }
            if Some(conn_id) == except {
                continue;
            }
            if entry.tx.send(event.clone()).is_err() {
                warn!(
                    "dropping room event for closed connection {} (user {})",
                    conn_id, entry.user_id
                );
            }
        }
    }

    /// Deliver to every currently connected socket, including other
    /// connections owned by the event's originating user.
    pub async fn global(&self, event: ServerEvent) {
        let conns = self.registry.map().read().await;
        for (&conn_id, entry) in conns.iter() {
            if entry.tx.send(event.clone()).is_err() {
                warn!(
                    "dropping global event for closed connection {} (user {})",
                    conn_id, entry.user_id
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_types::events::ServerEvent;

    fn deleted_event() -> ServerEvent {
        ServerEvent::ChannelDeleted {
            channel_id: Uuid::nil(),
        }
    }

    #[tokio::test]
    async fn room_delivery_respects_joined_set() {
        let registry = ConnectionRegistry::new();
        let router = BroadcastRouter::new(registry.clone());
        let channel = Uuid::new_v4();

        let (joined, mut joined_rx) = registry.register(Uuid::new_v4()).await;
        let (_bystander, mut bystander_rx) = registry.register(Uuid::new_v4()).await;
        registry.join(joined, channel).await;

        router
            .room(
                channel,
                ServerEvent::MessageDeleted {
                    message_id: Uuid::new_v4(),
                    channel_id: channel,
                },
                None,
            )
            .await;

        assert!(joined_rx.try_recv().is_ok());
        assert!(bystander_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn room_delivery_can_exclude_origin() {
        let registry = ConnectionRegistry::new();
        let router = BroadcastRouter::new(registry.clone());
        let channel = Uuid::new_v4();

        let user = Uuid::new_v4();
        let (origin, mut origin_rx) = registry.register(user).await;
        let (other, mut other_rx) = registry.register(user).await;
        registry.join(origin, channel).await;
        registry.join(other, channel).await;

        router
            .room(
                channel,
                ServerEvent::UserTyping {
                    channel_id: channel,
                    user_id: user,
                    user_name: "alice".into(),
                    is_typing: true,
                },
                Some(origin),
            )
            .await;

        assert!(origin_rx.try_recv().is_err());
        assert!(other_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn global_delivery_reaches_every_connection() {
        let registry = ConnectionRegistry::new();
        let router = BroadcastRouter::new(registry.clone());

        let (_a, mut a_rx) = registry.register(Uuid::new_v4()).await;
        let (_b, mut b_rx) = registry.register(Uuid::new_v4()).await;

        router.global(deleted_event()).await;

        assert!(a_rx.try_recv().is_ok());
        assert!(b_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn closed_connection_does_not_disturb_others() {
        let registry = ConnectionRegistry::new();
        let router = BroadcastRouter::new(registry.clone());

        let (_dead, dead_rx) = registry.register(Uuid::new_v4()).await;
        drop(dead_rx);
        let (_live, mut live_rx) = registry.register(Uuid::new_v4()).await;

        router.global(deleted_event()).await;

        assert!(live_rx.try_recv().is_ok());
    }
}
