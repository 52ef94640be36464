use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::ChannelPatch;
use crate::models::{Channel, MessageView};

/// Events sent FROM client TO server over the WebSocket gateway.
///
/// A closed enum with an exhaustive dispatcher on the server side: adding or
/// renaming an event is a compile-time concern, a misnamed event from a
/// client is a deserialization error on that connection only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Subscribe this connection to a channel's room
    JoinChannel { channel_id: Uuid },

    /// Unsubscribe this connection from a channel's room
    LeaveChannel { channel_id: Uuid },

    /// Post a message to a channel
    SendMessage {
        channel_id: Uuid,
        body: String,
        reply_to: Option<Uuid>,
    },

    /// Replace a message's body (sender only)
    EditMessage { message_id: Uuid, body: String },

    /// Tombstone a message (sender only)
    DeleteMessage { message_id: Uuid },

    /// Patch channel metadata
    EditChannel {
        channel_id: Uuid,
        patch: ChannelPatch,
    },

    /// Soft-delete a channel
    DeleteChannel { channel_id: Uuid },

    /// The user started typing in a channel
    Typing { channel_id: Uuid },

    /// The user stopped typing in a channel
    StopTyping { channel_id: Uuid },
}

/// Events sent FROM server TO clients over the WebSocket gateway.
///
/// Room-scoped events reach only connections that joined the channel's room;
/// global events reach every connected socket. Error events go back to the
/// originating connection alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Room-scoped: a new message in a joined channel, fully populated
    ReceiveMessage { message: MessageView },

    /// Room-scoped: a message body was replaced
    MessageEdited { message: MessageView },

    /// Room-scoped: a message was tombstoned
    MessageDeleted { message_id: Uuid, channel_id: Uuid },

    /// Room-scoped, excluding the origin connection
    UserTyping {
        channel_id: Uuid,
        user_id: Uuid,
        user_name: String,
        is_typing: bool,
    },

    /// Room-scoped, excluding the origin connection
    UserStopTyping {
        channel_id: Uuid,
        user_id: Uuid,
        is_typing: bool,
    },

    /// Global: a message landed somewhere — enough for unread bookkeeping
    /// on clients that never joined the room
    NewMessageGlobal {
        channel_id: Uuid,
        sender_id: Uuid,
        message: MessageView,
    },

    /// Global: channel metadata changed
    ChannelEdited { channel: Channel },

    /// Global: a channel was soft-deleted
    ChannelDeleted { channel_id: Uuid },

    /// Origin connection only: the send was rejected
    MessageError { reason: String },

    /// Origin connection only: the edit was rejected
    EditError { reason: String },

    /// Origin connection only: the delete was rejected
    DeleteError { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_events_use_snake_case_tags() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"join_channel","data":{"channel_id":"00000000-0000-0000-0000-000000000001"}}"#,
        )
        .unwrap();
        assert!(matches!(event, ClientEvent::JoinChannel { .. }));

        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"send_message","data":{"channel_id":"00000000-0000-0000-0000-000000000001","body":"hi","reply_to":null}}"#,
        )
        .unwrap();
        assert!(matches!(event, ClientEvent::SendMessage { ref body, .. } if body == "hi"));
    }

    #[test]
    fn unknown_client_event_is_a_parse_error() {
        let result: Result<ClientEvent, _> =
            serde_json::from_str(r#"{"type":"nuke_channel","data":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn server_event_tag_matches_wire_name() {
        let event = ServerEvent::ChannelDeleted {
            channel_id: Uuid::nil(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "channel_deleted");
        assert_eq!(
            json["data"]["channel_id"],
            "00000000-0000-0000-0000-000000000000"
        );
    }
}
