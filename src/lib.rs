//! Vanish WebSocket Server Library
//!
//! One-to-one ephemeral messaging: a message becomes permanently
//! unreadable a fixed duration after the receiver first views it. This
//! module exposes the server components for use in integration tests.

mod chats;
mod config;
mod connection;
mod directory;
mod error;
mod message;
mod protocol;
mod registry;
mod service;
mod store;
pub mod sweeper;

pub use chats::ChatPreview;
pub use config::Config;
pub use connection::{handle_connection, handle_request};
pub use directory::{InMemoryDirectory, User, UserDirectory};
pub use error::{ChatError, Result};
pub use message::{Message, MessageKind};
pub use protocol::{ClientRequest, ServerEvent};
pub use registry::ClientRegistry;
pub use service::ChatService;
pub use store::MessageStore;
