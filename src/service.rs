use tracing::debug;

use crate::chats::{self, ChatPreview};
use crate::config::Config;
use crate::directory::InMemoryDirectory;
use crate::error::{ChatError, Result};
use crate::message::{Message, MessageKind};
use crate::protocol::ServerEvent;
use crate::registry::ClientRegistry;
use crate::store::MessageStore;

/// The lifecycle controller: owns the message store, the per-user delivery
/// channels and the user directory, and enforces the
/// `Created -> Viewed -> Expired(deleted)` state machine.
#[derive(Debug)]
pub struct ChatService {
    config: Config,
    store: MessageStore,
    registry: ClientRegistry,
    directory: InMemoryDirectory,
}

impl ChatService {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store: MessageStore::new(),
            registry: ClientRegistry::new(),
            directory: InMemoryDirectory::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn directory(&self) -> &InMemoryDirectory {
        &self.directory
    }

    /// Accept a new message: validate, stamp metadata, store, and push
    /// `new_message` to both participants' live connections.
    pub fn send(
        &self,
        sender_id: &str,
        receiver_id: &str,
        kind: MessageKind,
        content: String,
        duration_ms: Option<i64>,
    ) -> Result<Message> {
        if sender_id == receiver_id {
            return Err(ChatError::InvalidParticipants);
        }
        if content.len() > self.config.max_content_len {
            return Err(ChatError::ContentTooLarge(content.len()));
        }
        let duration_ms = match duration_ms {
            None => self.config.default_duration_ms,
            Some(d) if self.config.allowed_durations_ms.contains(&d) => d,
            Some(d) => return Err(ChatError::InvalidDuration(d)),
        };

        let message = Message::new(
            sender_id.to_string(),
            receiver_id.to_string(),
            kind,
            content,
            duration_ms,
            now_millis(),
        );
        self.store.insert(message.clone());
        debug!("Stored message {} from {} to {}", message.id, sender_id, receiver_id);

        self.push_to(sender_id, &ServerEvent::NewMessage {
            message: message.clone(),
        });
        self.push_to(receiver_id, &ServerEvent::NewMessage {
            message: message.clone(),
        });
        Ok(message)
    }

    /// Stamp the receiver's first view and start the expiry countdown.
    ///
    /// Idempotent: a repeat call returns the already-stamped state without
    /// pushing another update. `NotFound` here usually means the message
    /// expired under the caller, which is a benign race.
    pub fn mark_viewed(&self, message_id: &str, requesting_user_id: &str) -> Result<Message> {
        let (message, freshly_viewed) =
            self.store
                .mark_viewed(message_id, requesting_user_id, now_millis())?;
        if freshly_viewed {
            debug!(
                "Message {} viewed, expires at {:?}",
                message.id, message.expires_at
            );
            self.push_to(&message.sender_id, &ServerEvent::MessageUpdated {
                message: message.clone(),
            });
            self.push_to(&message.receiver_id, &ServerEvent::MessageUpdated {
                message: message.clone(),
            });
        }
        Ok(message)
    }

    /// The unexpired history of the pair `{a, b}`, oldest first.
    pub fn messages_between(&self, a: &str, b: &str) -> Vec<Message> {
        self.store.conversation(a, b, now_millis())
    }

    /// The user's conversation list, newest activity first.
    pub fn recent_chats(&self, user_id: &str) -> Vec<ChatPreview> {
        chats::recent_chats(&self.store, &self.directory, user_id, now_millis())
    }

    /// One sweep tick at `now`: delete every expired message and signal
    /// each affected participant once, in aggregate. Returns the number of
    /// messages removed.
    pub fn sweep(&self, now: i64) -> usize {
        let removed = self.store.remove_expired(now);
        if removed.is_empty() {
            return 0;
        }
        let mut affected: Vec<String> = Vec::new();
        for message in &removed {
            for user_id in [&message.sender_id, &message.receiver_id] {
                if !affected.iter().any(|u| u == user_id) {
                    affected.push(user_id.clone());
                }
            }
        }
        debug!(
            "Sweep removed {} expired messages affecting {} users",
            removed.len(),
            affected.len()
        );
        for user_id in &affected {
            self.push_to(user_id, &ServerEvent::StateChanged);
        }
        removed.len()
    }

    /// Best-effort push: an offline target is skipped, never an error.
    fn push_to(&self, user_id: &str, event: &ServerEvent) {
        if let Err(e) = self.registry.push(user_id, event) {
            debug!("Skipping push: {}", e);
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn service() -> ChatService {
        ChatService::new(Config::default())
    }

    fn subscribe(
        service: &ChatService,
        user_id: &str,
    ) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        service.registry().join(user_id.to_string(), tx);
        rx
    }

    fn recv_type(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
        let payload = rx.try_recv().unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        value["type"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_send_rejects_self_message() {
        let service = service();
        assert_eq!(
            service.send("alice", "alice", MessageKind::Text, "hi".to_string(), None),
            Err(ChatError::InvalidParticipants)
        );
        assert!(service.store().is_empty());
    }

    #[test]
    fn test_send_rejects_disallowed_duration() {
        let service = service();
        assert_eq!(
            service.send(
                "alice",
                "bob",
                MessageKind::Text,
                "hi".to_string(),
                Some(1_234)
            ),
            Err(ChatError::InvalidDuration(1_234))
        );
    }

    #[test]
    fn test_send_defaults_duration() {
        let service = service();
        let message = service
            .send("alice", "bob", MessageKind::Text, "hi".to_string(), None)
            .unwrap();
        assert_eq!(message.duration_ms, 300_000);
        assert!(message.viewed_at.is_none());
        assert!(message.expires_at.is_none());
    }

    #[test]
    fn test_send_rejects_oversized_content() {
        let mut config = Config::default();
        config.max_content_len = 8;
        let service = ChatService::new(config);
        assert_eq!(
            service.send(
                "alice",
                "bob",
                MessageKind::Image,
                "123456789".to_string(),
                None
            ),
            Err(ChatError::ContentTooLarge(9))
        );
    }

    #[test]
    fn test_send_pushes_to_both_participants() {
        let service = service();
        let mut alice_rx = subscribe(&service, "alice");
        let mut bob_rx = subscribe(&service, "bob");

        service
            .send("alice", "bob", MessageKind::Text, "hi".to_string(), None)
            .unwrap();

        assert_eq!(recv_type(&mut alice_rx), "new_message");
        assert_eq!(recv_type(&mut bob_rx), "new_message");
    }

    #[test]
    fn test_send_with_offline_receiver_still_succeeds() {
        let service = service();
        // Nobody is subscribed; the push is silently skipped.
        let message = service
            .send("alice", "bob", MessageKind::Text, "hi".to_string(), None)
            .unwrap();
        assert_eq!(service.store().len(), 1);
        assert!(service
            .messages_between("alice", "bob")
            .iter()
            .any(|m| m.id == message.id));
    }

    #[test]
    fn test_mark_viewed_sets_deadline_and_notifies() {
        let service = service();
        let message = service
            .send(
                "alice",
                "bob",
                MessageKind::Text,
                "hi".to_string(),
                Some(60_000),
            )
            .unwrap();
        let mut alice_rx = subscribe(&service, "alice");

        let viewed = service.mark_viewed(&message.id, "bob").unwrap();
        let viewed_at = viewed.viewed_at.unwrap();
        assert_eq!(viewed.expires_at, Some(viewed_at + 60_000));
        assert_eq!(recv_type(&mut alice_rx), "message_updated");

        // Idempotent repeat: same stamps, no second update pushed.
        let again = service.mark_viewed(&message.id, "bob").unwrap();
        assert_eq!(again.viewed_at, viewed.viewed_at);
        assert_eq!(again.expires_at, viewed.expires_at);
        assert!(alice_rx.try_recv().is_err());
    }

    #[test]
    fn test_mark_viewed_receiver_only() {
        let service = service();
        let message = service
            .send("alice", "bob", MessageKind::Text, "hi".to_string(), None)
            .unwrap();
        assert_eq!(
            service.mark_viewed(&message.id, "alice"),
            Err(ChatError::Unauthorized)
        );
        assert_eq!(
            service.mark_viewed("no-such-id", "bob"),
            Err(ChatError::NotFound)
        );
    }

    #[test]
    fn test_sweep_notifies_each_affected_user_once() {
        let service = service();
        let first = service
            .send(
                "alice",
                "bob",
                MessageKind::Text,
                "one".to_string(),
                Some(60_000),
            )
            .unwrap();
        let second = service
            .send(
                "alice",
                "bob",
                MessageKind::Text,
                "two".to_string(),
                Some(60_000),
            )
            .unwrap();
        service.mark_viewed(&first.id, "bob").unwrap();
        let viewed = service.mark_viewed(&second.id, "bob").unwrap();

        let mut alice_rx = subscribe(&service, "alice");
        let mut bob_rx = subscribe(&service, "bob");

        let deadline = viewed.expires_at.unwrap();
        assert_eq!(service.sweep(deadline + 1), 2);
        assert!(service.store().is_empty());

        // One aggregate signal per participant, not one per message.
        assert_eq!(recv_type(&mut alice_rx), "state_changed");
        assert!(alice_rx.try_recv().is_err());
        assert_eq!(recv_type(&mut bob_rx), "state_changed");
        assert!(bob_rx.try_recv().is_err());
    }

    #[test]
    fn test_sweep_without_expired_messages_is_quiet() {
        let service = service();
        service
            .send("alice", "bob", MessageKind::Text, "hi".to_string(), None)
            .unwrap();
        let mut bob_rx = subscribe(&service, "bob");

        assert_eq!(service.sweep(now_millis() + 1), 0);
        assert!(bob_rx.try_recv().is_err());
        assert_eq!(service.store().len(), 1);
    }
}
