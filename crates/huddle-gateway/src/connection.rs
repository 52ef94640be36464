use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};

use huddle_core::{Actor, ChatService, ConnId};
use huddle_types::api::Claims;
use huddle_types::events::{ClientEvent, ServerEvent};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle a pre-authenticated WebSocket connection. The JWT was already
/// validated at the HTTP upgrade layer, so the socket goes straight into the
/// event loop under the claims' identity.
pub async fn handle_connection(socket: WebSocket, chat: ChatService, claims: Claims) {
    let actor = Actor::from(&claims);
    let (mut sender, mut receiver) = socket.split();

    let (conn_id, mut event_rx) = chat.registry().register(actor.user_id).await;
    info!("{} ({}) connected to gateway", actor.name, actor.user_id);

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward this connection's ordered event queue to the socket, with
    // heartbeat. Events arrive here in server processing order; a write
    // failure ends the connection, never the mutation that produced the
    // event.
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = event_rx.recv() => {
                    let event: ServerEvent = match result {
                        Some(event) => event,
                        None => break,
                    };
                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read events from the client
    let chat_recv = chat.clone();
    let actor_recv = actor.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => {
                        handle_event(&chat_recv, &actor_recv, conn_id, event).await;
                    }
                    Err(e) => {
                        warn!(
                            "{} ({}) bad event: {} -- raw: {}",
                            actor_recv.name,
                            actor_recv.user_id,
                            e,
                            truncate_for_log(&text)
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Drop the registry entry and joined-room set; no leave events are owed
    chat.registry().unregister(conn_id).await;
    info!("{} ({}) disconnected from gateway", actor.name, actor.user_id);
}

/// Cap logged client payloads at 200 bytes, backing off to a char boundary
/// so a multi-byte character straddling the cut cannot panic the recv task.
fn truncate_for_log(text: &str) -> &str {
    let mut cut = text.len().min(200);
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    &text[..cut]
}

/// Exhaustive dispatch over the closed inbound event enum. Mutation failures
/// become error events on this connection only; everyone else is untouched.
async fn handle_event(chat: &ChatService, actor: &Actor, conn_id: ConnId, event: ClientEvent) {
    match event {
        ClientEvent::JoinChannel { channel_id } => {
            match chat.authorize_join(actor, channel_id).await {
                Ok(()) => chat.registry().join(conn_id, channel_id).await,
                Err(e) => warn!(
                    "{} ({}) join {} refused: {}",
                    actor.name, actor.user_id, channel_id, e
                ),
            }
        }

        ClientEvent::LeaveChannel { channel_id } => {
            chat.registry().leave(conn_id, channel_id).await;
        }

        ClientEvent::SendMessage {
            channel_id,
            body,
            reply_to,
        } => {
            if let Err(e) = chat.send_message(actor, channel_id, &body, reply_to).await {
                warn!("{} ({}) send failed: {}", actor.name, actor.user_id, e);
                chat.registry()
                    .send_to(
                        conn_id,
                        ServerEvent::MessageError {
                            reason: e.to_string(),
                        },
                    )
                    .await;
            }
        }

        ClientEvent::EditMessage { message_id, body } => {
            if let Err(e) = chat.edit_message(actor, message_id, &body).await {
                warn!("{} ({}) edit failed: {}", actor.name, actor.user_id, e);
                chat.registry()
                    .send_to(
                        conn_id,
                        ServerEvent::EditError {
                            reason: e.to_string(),
                        },
                    )
                    .await;
            }
        }

        ClientEvent::DeleteMessage { message_id } => {
            if let Err(e) = chat.delete_message(actor, message_id).await {
                warn!("{} ({}) delete failed: {}", actor.name, actor.user_id, e);
                chat.registry()
                    .send_to(
                        conn_id,
                        ServerEvent::DeleteError {
                            reason: e.to_string(),
                        },
                    )
                    .await;
            }
        }

        ClientEvent::EditChannel { channel_id, patch } => {
            // Success broadcasts channel_edited globally from the directory
            if let Err(e) = chat.update_channel(actor, channel_id, patch).await {
                warn!(
                    "{} ({}) channel edit failed: {}",
                    actor.name, actor.user_id, e
                );
            }
        }

        ClientEvent::DeleteChannel { channel_id } => {
            if let Err(e) = chat.delete_channel(actor, channel_id).await {
                warn!(
                    "{} ({}) channel delete failed: {}",
                    actor.name, actor.user_id, e
                );
            }
        }

        ClientEvent::Typing { channel_id } => {
            chat.router()
                .room(
                    channel_id,
                    ServerEvent::UserTyping {
                        channel_id,
                        user_id: actor.user_id,
                        user_name: actor.name.clone(),
                        is_typing: true,
                    },
                    Some(conn_id),
                )
                .await;
        }

        ClientEvent::StopTyping { channel_id } => {
            chat.router()
                .room(
                    channel_id,
                    ServerEvent::UserStopTyping {
                        channel_id,
                        user_id: actor.user_id,
                        is_typing: false,
                    },
                    Some(conn_id),
                )
                .await;
        }
    }
}
