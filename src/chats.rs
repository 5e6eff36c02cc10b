use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::directory::{User, UserDirectory};
use crate::message::Message;
use crate::store::MessageStore;

/// One entry of a user's conversation list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatPreview {
    pub other_user: User,
    pub last_message: Option<Message>,
    pub unread_count: usize,
}

/// Derive the user's ongoing conversations from message history.
///
/// Counterparties come purely from unexpired messages; there is no separate
/// contacts table to keep in sync, so a pair whose entire history has
/// expired simply drops out of the list. Recomputed fully on every call;
/// the working set stays small because expiry keeps pruning it.
pub fn recent_chats(
    store: &MessageStore,
    directory: &dyn UserDirectory,
    user_id: &str,
    now: i64,
) -> Vec<ChatPreview> {
    let mut latest: HashMap<String, Message> = HashMap::new();
    let mut unread: HashMap<String, usize> = HashMap::new();

    for message in store.for_participant(user_id, now) {
        let other = if message.sender_id == user_id {
            message.receiver_id.clone()
        } else {
            message.sender_id.clone()
        };
        if message.receiver_id == user_id && message.viewed_at.is_none() {
            *unread.entry(other.clone()).or_insert(0) += 1;
        }
        let newer = latest
            .get(&other)
            .is_none_or(|current| current.created_at < message.created_at);
        if newer {
            latest.insert(other, message);
        }
    }

    let mut chats: Vec<ChatPreview> = latest
        .into_iter()
        .map(|(other_id, last_message)| ChatPreview {
            other_user: directory
                .find_by_id(&other_id)
                .unwrap_or_else(|| User::placeholder(&other_id)),
            unread_count: unread.get(&other_id).copied().unwrap_or(0),
            last_message: Some(last_message),
        })
        .collect();
    chats.sort_by_key(|chat| {
        std::cmp::Reverse(chat.last_message.as_ref().map_or(0, |m| m.created_at))
    });
    chats
}
