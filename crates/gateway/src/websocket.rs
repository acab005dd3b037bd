//! WebSocket endpoint: one task per connection, frames in both directions.
//!
//! Inbound text frames are [`ClientFrame`]s; everything outbound is a
//! [`relay_realtime::Envelope`] serialized by a dedicated writer task that
//! owns the socket sink. The connection task itself only reads, so a slow
//! client cannot block delivery fan-out from other tasks.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use relay_realtime::{
    Envelope, GroupId, MessageDraft, MessageId, MessageKind, RealtimeEvent, UserId,
};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state::GatewayState;

/// Create the WebSocket routes
pub fn create_websocket_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/ws", get(websocket_handler))
}

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub user_id: UserId,
}

/// Frames a client may send over the socket, tagged as `type`/`payload`
/// like the server's envelopes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Heartbeat to keep the connection alive
    Ping,
    /// Send a private message to another user
    PrivateMessage {
        receiver_id: UserId,
        content: String,
        #[serde(default)]
        kind: MessageKind,
        #[serde(default)]
        reply_to_id: Option<MessageId>,
    },
    /// Send a message to a group
    GroupMessage {
        group_id: GroupId,
        content: String,
        #[serde(default)]
        kind: MessageKind,
        #[serde(default)]
        reply_to_id: Option<MessageId>,
    },
    /// Mark a message as read by this user
    MessageRead { message_id: MessageId },
    /// Acknowledge receipt of a message
    MessageDelivered { message_id: MessageId },
    /// Revoke a recently sent message
    Revoke { message_id: MessageId },
    /// Typing indicator towards a user or a group
    Typing {
        #[serde(default)]
        receiver_id: Option<UserId>,
        #[serde(default)]
        group_id: Option<GroupId>,
    },
    /// End of a typing indicator
    StopTyping {
        #[serde(default)]
        receiver_id: Option<UserId>,
        #[serde(default)]
        group_id: Option<GroupId>,
    },
}

/// Upgrade handler for `/ws?user_id=<id>`.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<ConnectQuery>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.user_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>, user_id: UserId) {
    let session = Uuid::new_v4();
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (tx, mut rx) = mpsc::channel::<Envelope>(state.send_queue_depth);
    let (handle, _replaced) = state.registry.register(user_id, tx);

    info!(
        %session,
        user_id,
        connection = handle.connection_id(),
        online = state.registry.online_count(),
        "websocket connected"
    );

    // Writer task owns the sink; it ends once every sender clone is gone.
    let writer = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let text = match serde_json::to_string(&envelope) {
                Ok(text) => text,
                Err(error) => {
                    warn!(%error, kind = envelope.kind(), "failed to encode envelope");
                    continue;
                }
            };
            if ws_tx.send(WsMessage::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let greeting = RealtimeEvent::Connected {
        user_id,
        online_count: state.registry.online_count(),
    };
    state.registry.send(user_id, Envelope::new(greeting)).await;

    loop {
        tokio::select! {
            // the registry closed this handle: replaced by a newer
            // connection of the same user, or evicted on a failed write
            _ = handle.closed() => {
                debug!(%session, user_id, "connection closed by registry");
                break;
            }
            frame = ws_rx.next() => {
                let Some(Ok(frame)) = frame else { break };
                match frame {
                    WsMessage::Text(text) => {
                        dispatch_frame(&state, user_id, &text).await;
                    }
                    WsMessage::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    state.registry.unregister(&handle);
    // dropping our handle clone releases the last envelope sender
    drop(handle);
    let _ = writer.await;

    info!(%session, user_id, "websocket disconnected");
}

/// Parse and execute one inbound frame, reporting the outcome back to the
/// sending connection as an `ack` or `error` envelope.
async fn dispatch_frame(state: &Arc<GatewayState>, user_id: UserId, text: &str) {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(error) => {
            debug!(user_id, %error, "unparseable client frame");
            state
                .notifier
                .notify(
                    user_id,
                    RealtimeEvent::Error {
                        detail: format!("invalid frame: {error}"),
                    },
                )
                .await;
            return;
        }
    };

    match frame {
        ClientFrame::Ping => {
            state.notifier.notify(user_id, RealtimeEvent::Pong).await;
        }
        ClientFrame::PrivateMessage {
            receiver_id,
            content,
            kind,
            reply_to_id,
        } => {
            let draft = MessageDraft {
                content,
                kind,
                reply_to_id,
            };
            match state.delivery.send_private(user_id, receiver_id, draft).await {
                Ok((message, _outcome)) => {
                    acknowledge(state, user_id, "message_sent", Some(message)).await;
                }
                Err(error) => report(state, user_id, error).await,
            }
        }
        ClientFrame::GroupMessage {
            group_id,
            content,
            kind,
            reply_to_id,
        } => {
            let draft = MessageDraft {
                content,
                kind,
                reply_to_id,
            };
            match state.delivery.send_group(user_id, group_id, draft).await {
                Ok((message, _outcomes)) => {
                    acknowledge(state, user_id, "message_sent", Some(message)).await;
                }
                Err(error) => report(state, user_id, error).await,
            }
        }
        ClientFrame::MessageRead { message_id } => {
            match state.delivery.mark_read(user_id, message_id).await {
                Ok(()) => acknowledge(state, user_id, "message_read", None).await,
                Err(error) => report(state, user_id, error).await,
            }
        }
        ClientFrame::MessageDelivered { message_id } => {
            match state.delivery.mark_delivered(message_id).await {
                Ok(()) => acknowledge(state, user_id, "message_delivered", None).await,
                Err(error) => report(state, user_id, error).await,
            }
        }
        ClientFrame::Revoke { message_id } => {
            match state.delivery.revoke(user_id, message_id).await {
                Ok(message) => acknowledge(state, user_id, "message_revoked", Some(message)).await,
                Err(error) => report(state, user_id, error).await,
            }
        }
        ClientFrame::Typing {
            receiver_id,
            group_id,
        } => {
            forward_typing(state, user_id, receiver_id, group_id, false).await;
        }
        ClientFrame::StopTyping {
            receiver_id,
            group_id,
        } => {
            forward_typing(state, user_id, receiver_id, group_id, true).await;
        }
    }
}

/// Typing indicators are ephemeral: forwarded to the live audience and
/// never persisted. Failures are silently dropped.
async fn forward_typing(
    state: &Arc<GatewayState>,
    from_user_id: UserId,
    receiver_id: Option<UserId>,
    group_id: Option<GroupId>,
    stop: bool,
) {
    let event = if stop {
        RealtimeEvent::StopTyping {
            from_user_id,
            group_id,
        }
    } else {
        RealtimeEvent::Typing {
            from_user_id,
            group_id,
        }
    };

    match (receiver_id, group_id) {
        (Some(receiver_id), None) => {
            state.notifier.notify(receiver_id, event).await;
        }
        (None, Some(group_id)) => {
            if let Err(error) = state
                .delivery
                .broadcast_to_group(group_id, from_user_id, event)
                .await
            {
                debug!(from_user_id, group_id, %error, "typing fan-out failed");
            }
        }
        _ => {
            state
                .notifier
                .notify(
                    from_user_id,
                    RealtimeEvent::Error {
                        detail: "typing frames need exactly one of receiver_id or group_id"
                            .to_string(),
                    },
                )
                .await;
        }
    }
}

async fn acknowledge(
    state: &Arc<GatewayState>,
    user_id: UserId,
    detail: &str,
    message: Option<relay_realtime::Message>,
) {
    state
        .notifier
        .notify(
            user_id,
            RealtimeEvent::Ack {
                detail: detail.to_string(),
                message,
            },
        )
        .await;
}

async fn report(state: &Arc<GatewayState>, user_id: UserId, error: relay_realtime::CoreError) {
    debug!(user_id, %error, "client frame rejected");
    state
        .notifier
        .notify(
            user_id,
            RealtimeEvent::Error {
                detail: error.to_string(),
            },
        )
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_private_message_frame_with_defaults() {
        let frame: ClientFrame = serde_json::from_str(
            r#"{"type":"private_message","payload":{"receiver_id":7,"content":"hi"}}"#,
        )
        .unwrap();

        assert_eq!(
            frame,
            ClientFrame::PrivateMessage {
                receiver_id: 7,
                content: "hi".to_string(),
                kind: MessageKind::Text,
                reply_to_id: None,
            }
        );
    }

    #[test]
    fn parses_group_message_frame_with_kind() {
        let frame: ClientFrame = serde_json::from_str(
            r#"{"type":"group_message","payload":{"group_id":3,"content":"pic","kind":"image","reply_to_id":12}}"#,
        )
        .unwrap();

        assert_eq!(
            frame,
            ClientFrame::GroupMessage {
                group_id: 3,
                content: "pic".to_string(),
                kind: MessageKind::Image,
                reply_to_id: Some(12),
            }
        );
    }

    #[test]
    fn parses_ping_without_payload() {
        let frame: ClientFrame = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(frame, ClientFrame::Ping);
    }

    #[test]
    fn parses_lifecycle_frames() {
        let read: ClientFrame =
            serde_json::from_str(r#"{"type":"message_read","payload":{"message_id":5}}"#).unwrap();
        assert_eq!(read, ClientFrame::MessageRead { message_id: 5 });

        let revoke: ClientFrame =
            serde_json::from_str(r#"{"type":"revoke","payload":{"message_id":5}}"#).unwrap();
        assert_eq!(revoke, ClientFrame::Revoke { message_id: 5 });
    }

    #[test]
    fn parses_typing_frame_for_group() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"typing","payload":{"group_id":4}}"#).unwrap();
        assert_eq!(
            frame,
            ClientFrame::Typing {
                receiver_id: None,
                group_id: Some(4),
            }
        );
    }

    #[test]
    fn rejects_unknown_frame_type() {
        let result = serde_json::from_str::<ClientFrame>(r#"{"type":"shutdown"}"#);
        assert!(result.is_err());
    }
}
