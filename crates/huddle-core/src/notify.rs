use tracing::warn;

use huddle_types::models::MessageView;

/// Fire-and-forget webhook to the outbound notification service (the thing
/// that emails people about messages they missed). Never blocks and never
/// fails the mutation path; errors are logged and dropped.
#[derive(Clone)]
pub struct Notifier {
    http: reqwest::Client,
    url: Option<String>,
}

impl Notifier {
    pub fn new(url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }

    /// No-op notifier for tests and unconfigured deployments.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn message_sent(&self, message: &MessageView) {
        let Some(url) = self.url.clone() else {
            return;
        };
        let http = self.http.clone();
        let payload = serde_json::json!({
            "kind": "message_sent",
            "channel_id": message.channel_id,
            "message_id": message.id,
            "sender_id": message.sender_id,
            "sender_name": message.sender_name,
            "body": message.body,
            "created_at": message.created_at,
        });

        tokio::spawn(async move {
            if let Err(e) = http.post(&url).json(&payload).send().await {
                warn!("notify webhook failed: {}", e);
            }
        });
    }
}
