pub mod directory;
pub mod error;
pub mod notify;
pub mod ordering;
pub mod registry;
pub mod router;
pub mod store;
pub mod unread;

mod convert;

use std::sync::Arc;

use tracing::error;
use uuid::Uuid;

use huddle_db::Database;
use huddle_types::api::Claims;

pub use error::{ChatError, Result};
pub use notify::Notifier;
pub use ordering::ChannelLocks;
pub use registry::{ConnId, ConnectionRegistry};
pub use router::BroadcastRouter;

/// The authenticated caller, supplied by the identity boundary on every
/// operation. Never constructed from client-provided payload fields.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Uuid,
    pub name: String,
    pub org_id: Uuid,
}

impl From<&Claims> for Actor {
    fn from(claims: &Claims) -> Self {
        Self {
            user_id: claims.sub,
            name: claims.name.clone(),
            org_id: claims.org,
        }
    }
}

/// The messaging core: channel directory, message store, read-state
/// tracking, and the fan-out handles. One instance per process, built in
/// `main` and shared by the REST and WebSocket surfaces.
#[derive(Clone)]
pub struct ChatService {
    db: Arc<Database>,
    registry: ConnectionRegistry,
    router: BroadcastRouter,
    notifier: Notifier,
    locks: ChannelLocks,
}

impl ChatService {
    pub fn new(
        db: Arc<Database>,
        registry: ConnectionRegistry,
        router: BroadcastRouter,
        notifier: Notifier,
    ) -> Self {
        Self {
            db,
            registry,
            router,
            notifier,
            locks: ChannelLocks::new(),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn router(&self) -> &BroadcastRouter {
        &self.router
    }

    /// Run a blocking database closure off the async runtime. Store errors
    /// abort the operation; nothing has been broadcast at that point.
    pub(crate) async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ChatError::Store(anyhow::anyhow!("database worker failed: {}", e))
            })?
            .map_err(ChatError::Store)
    }
}
