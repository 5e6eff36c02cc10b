use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{tungstenite::Message as WsFrame, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::directory::User;
use crate::error::ChatError;
use crate::protocol::{ClientRequest, ServerEvent};
use crate::service::ChatService;

/// Handle a single WebSocket connection.
pub async fn handle_connection(ws_stream: WebSocketStream<TcpStream>, service: Arc<ChatService>) {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Wait for the Join frame to learn who this connection belongs to
    let user_id = match wait_for_join(&mut ws_receiver, &service).await {
        Some(id) => id,
        None => {
            warn!("Connection closed before joining");
            return;
        }
    };

    info!("User joined: {}", user_id);

    // Channel for pushing events to this client; joining replaces any
    // previous subscription for the same user
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let reply_tx = tx.clone();
    service.registry().join(user_id.clone(), tx);

    let joined = ServerEvent::Joined {
        success: true,
        message: "Joined".to_string(),
    };
    match serde_json::to_string(&joined) {
        Ok(json) => {
            if let Err(e) = ws_sender.send(WsFrame::Text(json.into())).await {
                error!("Failed to send join ack to {}: {}", user_id, e);
            }
        }
        Err(e) => {
            error!("Failed to serialize join ack for {}: {}", user_id, e);
        }
    }

    // Forward pushed events from the channel to the WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(WsFrame::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    let user_id_clone = user_id.clone();
    let service_clone = service.clone();

    loop {
        tokio::select! {
            res = ws_receiver.next() => {
                match res {
                    Some(Ok(WsFrame::Text(text))) => {
                        if let Some(reply) = handle_request(&text, &user_id_clone, &service_clone) {
                            match serde_json::to_string(&reply) {
                                Ok(json) => {
                                    // Replies go to this connection's own
                                    // channel, not through the registry: a
                                    // racing reconnect must not steal them
                                    if reply_tx.send(json).is_err() {
                                        break;
                                    }
                                }
                                Err(e) => {
                                    error!("Failed to serialize reply for {}: {}", user_id_clone, e);
                                }
                            }
                        }
                    }
                    Some(Ok(WsFrame::Close(_))) => {
                        info!("User {} sent close frame", user_id_clone);
                        break;
                    }
                    Some(Ok(WsFrame::Ping(data))) => {
                        let _ = data;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error for user {}: {}", user_id_clone, e);
                        break;
                    }
                    None => {
                        info!("WebSocket stream ended for user {}", user_id_clone);
                        break;
                    }
                    _ => {}
                }
            }
            _ = &mut send_task => {
                info!("Send task finished for user {} (likely connection lost)", user_id_clone);
                break;
            }
        }
    }

    // Tear down only the live subscription; completed sends and views stay
    send_task.abort();
    drop(reply_tx);
    service.registry().leave(&user_id);

    info!("User disconnected: {}", user_id);
}

/// Wait for the Join frame from a new connection and record the user's
/// display metadata in the directory.
async fn wait_for_join(
    receiver: &mut futures_util::stream::SplitStream<WebSocketStream<TcpStream>>,
    service: &ChatService,
) -> Option<String> {
    // Give the client 10 seconds to join
    let timeout = tokio::time::timeout(std::time::Duration::from_secs(10), async {
        while let Some(result) = receiver.next().await {
            if let Ok(WsFrame::Text(text)) = result {
                match serde_json::from_str::<ClientRequest>(&text) {
                    Ok(ClientRequest::Join { user_id, username }) => {
                        service.directory().upsert(User {
                            id: user_id.clone(),
                            username: username.unwrap_or_else(|| user_id.clone()),
                            bio: None,
                        });
                        return Some(user_id);
                    }
                    Ok(_) => {
                        warn!("Request before join, ignoring");
                    }
                    Err(e) => {
                        warn!("Failed to parse join frame: {}", e);
                    }
                }
            }
        }
        None
    });

    match timeout.await {
        Ok(result) => result,
        Err(_) => {
            warn!("Join timeout");
            None
        }
    }
}

/// Dispatch one request from a joined connection. The requesting identity
/// always comes from the connection itself, never from the payload, so a
/// client cannot view-mark or query on another user's behalf.
///
/// Returns a direct reply frame where the request warrants one; send and
/// view results arrive as pushed events instead.
pub fn handle_request(text: &str, user_id: &str, service: &ChatService) -> Option<ServerEvent> {
    let request: ClientRequest = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!("Failed to parse request from {}: {}", user_id, e);
            return Some(ServerEvent::Error {
                message: "malformed request".to_string(),
            });
        }
    };

    match request {
        ClientRequest::Join { .. } => {
            // Already joined, ignore
            None
        }
        ClientRequest::SendMessage {
            receiver_id,
            kind,
            content,
            duration_ms,
        } => match service.send(user_id, &receiver_id, kind, content, duration_ms) {
            // The sender's own copy arrives as a new_message push
            Ok(_) => None,
            Err(e) => Some(ServerEvent::Error {
                message: e.to_string(),
            }),
        },
        ClientRequest::MarkViewed { message_id } => {
            match service.mark_viewed(&message_id, user_id) {
                Ok(_) => None,
                Err(ChatError::NotFound) => {
                    // Expected race: the message expired before the view
                    // arrived; degrade silently
                    debug!("View of {} lost the expiry race", message_id);
                    None
                }
                Err(e) => Some(ServerEvent::Error {
                    message: e.to_string(),
                }),
            }
        }
        ClientRequest::GetMessages { with } => Some(ServerEvent::Messages {
            messages: service.messages_between(user_id, &with),
            with,
        }),
        ClientRequest::GetRecentChats => Some(ServerEvent::RecentChats {
            chats: service.recent_chats(user_id),
        }),
    }
}
