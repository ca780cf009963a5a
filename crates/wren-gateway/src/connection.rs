use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};

use wren_db::Database;
use wren_types::error::ServiceError;
use wren_types::events::{ClientEvent, ServerEvent};

use crate::registry::SessionRegistry;
use crate::services::Services;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a fresh connection gets to bind itself to a user before
/// the server hangs up.
const BIND_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle a single client connection for its whole lifetime: wait for
/// the identity bind, register with the session registry, pump events
/// both ways, and tear presence down on disconnect.
pub async fn handle_connection(
    socket: WebSocket,
    registry: SessionRegistry,
    db: Arc<Database>,
    services: Arc<Services>,
) {
    let (mut sender, mut receiver) = socket.split();

    // Step 1: the first event must bind the connection to a user
    let user_id = match wait_for_bind(&mut receiver).await {
        Some(id) => id,
        None => {
            warn!("client failed to bind a user, closing");
            return;
        }
    };

    info!("user {} connected to gateway", user_id);

    // Step 2: register the session and flip the presence flag
    let (conn_id, mut user_rx) = registry.bind(user_id).await;
    set_online_flag(db.clone(), user_id, true).await;

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward targeted events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = user_rx.recv() => {
                    let event = match result {
                        Some(event) => event,
                        // Registry entry superseded or dropped
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
                            warn!("heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
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

    // Read events from the client and dispatch to the services
    let registry_recv = registry.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => {
                        handle_event(&services, &registry_recv, user_id, event).await;
                    }
                    Err(e) => {
                        warn!(
                            "user {} sent a bad frame: {} -- raw: {}",
                            user_id,
                            e,
                            frame_preview(&text)
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

    // Only mark offline if this connection still owned the registry
    // entry — a reconnect may have superseded it.
    match registry.unbind(user_id, conn_id).await {
        Some(connected_at) => {
            set_online_flag(db, user_id, false).await;
            let session_secs = (chrono::Utc::now() - connected_at).num_seconds();
            info!(
                "user {} disconnected from gateway after {}s",
                user_id, session_secs
            );
        }
        None => {
            info!("user {} closed a superseded connection", user_id);
        }
    }
}

async fn wait_for_bind(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
) -> Option<i64> {
    let bound = tokio::time::timeout(BIND_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(ClientEvent::UserConnected { user_id }) =
                    serde_json::from_str::<ClientEvent>(&text)
                {
                    return Some(user_id);
                }
            }
        }
        None
    });

    bound.await.ok().flatten()
}

/// A presence-flag write failing is logged but never fatal — the
/// registry, not the store, is authoritative for routing.
async fn set_online_flag(db: Arc<Database>, user_id: i64, online: bool) {
    let result = tokio::task::spawn_blocking(move || db.set_online(user_id, online)).await;
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("failed to set online flag for user {}: {:#}", user_id, e),
        Err(e) => warn!("online flag task for user {} failed: {}", user_id, e),
    }
}

/// Dispatch one inbound event. Failures are reported to the bound
/// user's own live session only; nothing here can take the server down.
async fn handle_event(
    services: &Services,
    registry: &SessionRegistry,
    bound_user: i64,
    event: ClientEvent,
) {
    match event {
        // Already bound; a repeat is harmless noise
        ClientEvent::UserConnected { .. } => {}

        ClientEvent::SendMessage {
            conversation_id,
            sender_id,
            content,
        } => {
            if let Err(err) = services
                .messages
                .send(conversation_id, sender_id, content)
                .await
            {
                log_failure("send_message", &err);
                registry
                    .send_to_user(
                        bound_user,
                        ServerEvent::Error {
                            context: "send_message".to_string(),
                            message: err.user_message(),
                        },
                    )
                    .await;
            }
        }

        ClientEvent::SendMoney {
            sender_id,
            receiver_id,
            amount,
            conversation_id,
        } => {
            if let Err(err) = services
                .transfers
                .transfer(sender_id, receiver_id, amount, conversation_id)
                .await
            {
                log_failure("send_money", &err);
                registry
                    .send_to_user(
                        bound_user,
                        ServerEvent::MoneySent {
                            success: false,
                            amount: None,
                            message: Some(err.user_message()),
                        },
                    )
                    .await;
            }
        }

        ClientEvent::SendFriendRequest {
            sender_id,
            receiver_username,
        } => {
            if let Err(err) = services
                .friendships
                .send_request(sender_id, receiver_username)
                .await
            {
                log_failure("send_friend_request", &err);
                registry
                    .send_to_user(
                        bound_user,
                        ServerEvent::FriendRequestResponse {
                            success: false,
                            message: err.user_message(),
                        },
                    )
                    .await;
            }
        }

        ClientEvent::RespondFriendRequest { request_id, accept } => {
            if let Err(err) = services.friendships.respond(request_id, accept).await {
                log_failure("respond_friend_request", &err);
                registry
                    .send_to_user(
                        bound_user,
                        ServerEvent::FriendRequestResponse {
                            success: false,
                            message: err.user_message(),
                        },
                    )
                    .await;
            }
        }
    }
}

fn log_failure(context: &str, err: &ServiceError) {
    if err.is_persistence() {
        error!("{} failed: {:#}", context, err);
    } else {
        debug!("{} rejected: {}", context, err);
    }
}

/// Truncate a frame for logging without splitting a multibyte UTF-8
/// sequence, which would panic the recv task on hostile input.
fn frame_preview(text: &str) -> &str {
    const MAX_PREVIEW_BYTES: usize = 200;
    if text.len() <= MAX_PREVIEW_BYTES {
        return text;
    }
    let mut end = MAX_PREVIEW_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_preview_never_splits_a_multibyte_character() {
        // A two-byte character straddling the truncation boundary
        let frame = format!("{}é and more garbage", "x".repeat(199));
        let preview = frame_preview(&frame);
        assert_eq!(preview, "x".repeat(199));
        assert!(preview.len() <= 200);
    }

    #[test]
    fn frame_preview_leaves_short_frames_alone() {
        assert_eq!(frame_preview("not json"), "not json");
        assert_eq!(frame_preview(""), "");
    }

    #[test]
    fn frame_preview_cuts_at_the_limit_on_ascii() {
        let frame = "a".repeat(500);
        assert_eq!(frame_preview(&frame).len(), 200);
    }
}
