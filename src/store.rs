use dashmap::DashMap;

use crate::error::{ChatError, Result};
use crate::message::Message;

/// In-memory message store shared by request handlers and the sweeper.
///
/// All state is process-lifetime only; a restart clears history. Mutations
/// to a single message happen under that message's entry lock, which is
/// what makes concurrent view-marks on the same id serialize.
#[derive(Debug, Default)]
pub struct MessageStore {
    /// message id -> message
    messages: DashMap<String, Message>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self {
            messages: DashMap::new(),
        }
    }

    pub fn insert(&self, message: Message) {
        self.messages.insert(message.id.clone(), message);
    }

    /// Point lookup. Returns `None` for expired-but-not-yet-swept messages
    /// so readers never observe a message past its deadline.
    pub fn get(&self, message_id: &str, now: i64) -> Option<Message> {
        self.messages
            .get(message_id)
            .filter(|m| !m.is_expired(now))
            .map(|m| m.clone())
    }

    /// All unexpired messages of the unordered pair `{a, b}`, ascending by
    /// creation time.
    pub fn conversation(&self, a: &str, b: &str, now: i64) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.between(a, b) && !m.is_expired(now))
            .map(|m| m.clone())
            .collect();
        messages.sort_by_key(|m| m.created_at);
        messages
    }

    /// All unexpired messages the user sent or received.
    pub fn for_participant(&self, user_id: &str, now: i64) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| m.involves(user_id) && !m.is_expired(now))
            .map(|m| m.clone())
            .collect()
    }

    /// Apply the view transition under the message's entry lock.
    ///
    /// Returns the message and whether this call performed the transition;
    /// a repeat call is a no-op that returns the already-stamped state, so
    /// two racing viewers observe identical `viewed_at`/`expires_at`.
    pub fn mark_viewed(
        &self,
        message_id: &str,
        viewer_id: &str,
        now: i64,
    ) -> Result<(Message, bool)> {
        let mut entry = self
            .messages
            .get_mut(message_id)
            .ok_or(ChatError::NotFound)?;
        if entry.is_expired(now) {
            // Expired but not yet swept: indistinguishable from deleted.
            return Err(ChatError::NotFound);
        }
        if entry.viewed_at.is_none() {
            if entry.receiver_id != viewer_id {
                return Err(ChatError::Unauthorized);
            }
            entry.mark_viewed(now);
            return Ok((entry.clone(), true));
        }
        if !entry.involves(viewer_id) {
            return Err(ChatError::Unauthorized);
        }
        Ok((entry.clone(), false))
    }

    /// Delete every message whose deadline has passed and return the
    /// removed records. Idempotent; unviewed messages are never touched.
    pub fn remove_expired(&self, now: i64) -> Vec<Message> {
        let expired: Vec<String> = self
            .messages
            .iter()
            .filter(|m| m.is_expired(now))
            .map(|m| m.id.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|id| self.messages.remove(&id).map(|(_, msg)| msg))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
