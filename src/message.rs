use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message payload variant: plain text or an image carried as opaque
/// encoded text (e.g. base64).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
}

/// A one-to-one ephemeral message.
///
/// Lifecycle: created with `viewed_at = None` → the receiver's first view
/// stamps `viewed_at` and derives `expires_at = viewed_at + duration_ms` →
/// the sweeper deletes it once `now >= expires_at`. `expires_at` is `Some`
/// iff `viewed_at` is `Some`; an unviewed message never expires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub kind: MessageKind,
    pub content: String,
    /// Epoch millis, stamped at insertion.
    pub created_at: i64,
    /// Epoch millis of the receiver's first view, set at most once.
    pub viewed_at: Option<i64>,
    /// Epoch millis deadline, derived from `viewed_at`.
    pub expires_at: Option<i64>,
    /// Lifespan after first view, in millis.
    pub duration_ms: i64,
}

impl Message {
    pub fn new(
        sender_id: String,
        receiver_id: String,
        kind: MessageKind,
        content: String,
        duration_ms: i64,
        now: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender_id,
            receiver_id,
            kind,
            content,
            created_at: now,
            viewed_at: None,
            expires_at: None,
            duration_ms,
        }
    }

    /// Stamp the first view at `now`. Returns `false` without touching
    /// anything if the message was already viewed.
    pub fn mark_viewed(&mut self, now: i64) -> bool {
        if self.viewed_at.is_some() {
            return false;
        }
        self.viewed_at = Some(now);
        self.expires_at = Some(now + self.duration_ms);
        true
    }

    /// The single expiry predicate shared by the read path and the sweeper.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }

    /// True if the message belongs to the unordered pair `{a, b}`.
    pub fn between(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }
}
