use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Display metadata for a participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl User {
    /// Stand-in for a counterparty the directory does not know yet, so a
    /// conversation preview is never dropped while directory data lags
    /// behind message history.
    pub fn placeholder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            username: id.to_string(),
            bio: None,
        }
    }
}

/// Read-only lookup of user records. The lifecycle core only resolves
/// display metadata through this; it never mutates user records.
pub trait UserDirectory: Send + Sync {
    fn find_by_id(&self, id: &str) -> Option<User>;
    fn find_by_username(&self, username: &str) -> Option<User>;
}

/// Process-local directory populated by the transport layer from `join`
/// payloads.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: DashMap<String, User>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
        }
    }

    pub fn upsert(&self, user: User) {
        self.users.insert(user.id.clone(), user);
    }
}

impl UserDirectory for InMemoryDirectory {
    fn find_by_id(&self, id: &str) -> Option<User> {
        self.users.get(id).map(|u| u.clone())
    }

    fn find_by_username(&self, username: &str) -> Option<User> {
        self.users
            .iter()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .map(|u| u.clone())
    }
}
