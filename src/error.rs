use thiserror::Error;

/// Errors produced by the message lifecycle and delivery paths.
///
/// `NotFound` is an expected outcome of expiry races and callers should
/// degrade to an empty result rather than fail. `TransportUnavailable` is
/// never surfaced to clients; a push to an offline user is silently skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("sender and receiver must differ")]
    InvalidParticipants,
    #[error("message not found")]
    NotFound,
    #[error("only the receiver may mark a message viewed")]
    Unauthorized,
    #[error("duration {0}ms is not an allowed lifespan")]
    InvalidDuration(i64),
    #[error("content of {0} bytes exceeds the size cap")]
    ContentTooLarge(usize),
    #[error("no live subscription for user {0}")]
    TransportUnavailable(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;
