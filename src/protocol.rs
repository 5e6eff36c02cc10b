use serde::{Deserialize, Serialize};

use crate::chats::ChatPreview;
use crate::message::{Message, MessageKind};

/// Requests a client sends over its WebSocket. `Join` must be the first
/// frame on a fresh connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientRequest {
    #[serde(rename = "join")]
    Join {
        user_id: String,
        #[serde(default)]
        username: Option<String>,
    },
    #[serde(rename = "send_message")]
    SendMessage {
        receiver_id: String,
        kind: MessageKind,
        content: String,
        #[serde(default)]
        duration_ms: Option<i64>,
    },
    #[serde(rename = "mark_viewed")]
    MarkViewed { message_id: String },
    #[serde(rename = "get_messages")]
    GetMessages { with: String },
    #[serde(rename = "get_recent_chats")]
    GetRecentChats,
}

/// Frames the server pushes to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "joined")]
    Joined { success: bool, message: String },
    #[serde(rename = "new_message")]
    NewMessage { message: Message },
    #[serde(rename = "message_updated")]
    MessageUpdated { message: Message },
    /// Aggregate signal after a sweep removed messages the user was party
    /// to; clients re-fetch rather than receive per-message deletions.
    #[serde(rename = "state_changed")]
    StateChanged,
    #[serde(rename = "messages")]
    Messages { with: String, messages: Vec<Message> },
    #[serde(rename = "recent_chats")]
    RecentChats { chats: Vec<ChatPreview> },
    #[serde(rename = "error")]
    Error { message: String },
}
