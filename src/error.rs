//! Error types for the match queue service
//!
//! User-facing failures are recovered at the coordinator boundary and turned
//! into notifier messages; only internal errors propagate via anyhow.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific queueing scenarios
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("player is already queued or in a match group")]
    AlreadyQueued,

    #[error("unknown queue category: {category}")]
    UnknownCategory { category: String },

    #[error("queue is full: {category}")]
    QueueFull { category: String },

    #[error("player is not in any queue")]
    NotQueued,

    #[error("player has no match awaiting confirmation")]
    NoPendingConfirmation,

    #[error("group no longer active: {group_id}")]
    StaleGroup { group_id: String },

    #[error("AMQP connection failed: {message}")]
    AmqpConnectionFailed { message: String },

    #[error("invalid command request: {reason}")]
    InvalidCommandRequest { reason: String },

    #[error("configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("internal service error: {message}")]
    Internal { message: String },
}

impl QueueError {
    /// Shorthand for the poisoned-lock case, the only way the in-memory
    /// tables can fail.
    pub fn lock(what: &str) -> Self {
        QueueError::Internal {
            message: format!("failed to acquire {} lock", what),
        }
    }
}
