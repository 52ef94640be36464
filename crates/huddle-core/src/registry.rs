use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use huddle_types::events::ServerEvent;

/// Identifier for one live connection. A user with three tabs open has three
/// of these, tracked independently.
pub type ConnId = Uuid;

pub(crate) struct ConnectionEntry {
    pub(crate) user_id: Uuid,
    /// Channels this specific connection has explicitly joined
    pub(crate) joined: HashSet<Uuid>,
    pub(crate) tx: mpsc::UnboundedSender<ServerEvent>,
}

/// All live connections and their joined-room sets. Constructed once at
/// process start and passed by handle — never ambient global state.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<ConnId, ConnectionEntry>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a new connection for a user. Returns the connection id and
    /// the receiving half of its ordered event queue.
    pub async fn register(&self, user_id: Uuid) -> (ConnId, mpsc::UnboundedReceiver<ServerEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.write().await.insert(
            conn_id,
            ConnectionEntry {
                user_id,
                joined: HashSet::new(),
                tx,
            },
        );
        debug!("connection {} registered for user {}", conn_id, user_id);
        (conn_id, rx)
    }

    /// Drop a connection and its joined-room set. No leave events are
    /// emitted; the connection simply stops receiving broadcasts.
    pub async fn unregister(&self, conn_id: ConnId) {
        self.inner.write().await.remove(&conn_id);
        debug!("connection {} unregistered", conn_id);
    }

    pub async fn join(&self, conn_id: ConnId, channel_id: Uuid) {
        if let Some(entry) = self.inner.write().await.get_mut(&conn_id) {
            entry.joined.insert(channel_id);
        }
    }

    pub async fn leave(&self, conn_id: ConnId, channel_id: Uuid) {
        if let Some(entry) = self.inner.write().await.get_mut(&conn_id) {
            entry.joined.remove(&channel_id);
        }
    }

    /// Remove a channel from every connection's joined set. Called on
    /// channel soft-delete so no further room-scoped events can originate
    /// from it; re-joining is refused at the directory.
    pub async fn evict_channel(&self, channel_id: Uuid) {
        for entry in self.inner.write().await.values_mut() {
            entry.joined.remove(&channel_id);
        }
    }

    /// Deliver an event to one connection (error events go back to the
    /// origin only).
    pub async fn send_to(&self, conn_id: ConnId, event: ServerEvent) {
        if let Some(entry) = self.inner.read().await.get(&conn_id) {
            let _ = entry.tx.send(event);
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.len()
    }

    pub(crate) fn map(&self) -> &RwLock<HashMap<ConnId, ConnectionEntry>> {
        &self.inner
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
