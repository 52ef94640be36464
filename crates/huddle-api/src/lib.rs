pub mod channels;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod unread;

use std::sync::Arc;

use huddle_core::ChatService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub chat: ChatService,
    pub jwt_secret: String,
}
