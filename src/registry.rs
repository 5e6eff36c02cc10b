use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::error::{ChatError, Result};
use crate::protocol::ServerEvent;

/// Per-user live delivery channels.
///
/// At most one subscription per user: a reconnect replaces the previous
/// channel, and the replaced connection winds down on its own. Delivery is
/// best-effort with no queue or replay; a client that was offline re-fetches
/// current state after joining.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    /// user_id -> sender half of the connection's outbound channel
    clients: DashMap<String, mpsc::UnboundedSender<String>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }

    /// Register a user's delivery channel, replacing any prior one.
    pub fn join(&self, user_id: String, tx: mpsc::UnboundedSender<String>) {
        if self.clients.insert(user_id.clone(), tx).is_some() {
            debug!("Replaced existing subscription for {}", user_id);
        }
    }

    /// Drop a user's subscription, but only if its channel is closed. A
    /// replaced connection's cleanup must not tear down the replacement.
    pub fn leave(&self, user_id: &str) {
        self.clients.remove_if(user_id, |_, tx| tx.is_closed());
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.clients
            .get(user_id)
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }

    /// Push an event to a user's live connection, if any.
    pub fn push(&self, user_id: &str, event: &ServerEvent) -> Result<()> {
        let payload = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize event for {}: {}", user_id, e);
                return Err(ChatError::TransportUnavailable(user_id.to_string()));
            }
        };
        let delivered = self
            .clients
            .get(user_id)
            .map(|tx| tx.send(payload).is_ok())
            .unwrap_or(false);
        if delivered {
            Ok(())
        } else {
            Err(ChatError::TransportUnavailable(user_id.to_string()))
        }
    }
}
