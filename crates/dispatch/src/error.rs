use onyx_store::StoreError;

/// Why a mutation did not succeed remotely.
///
/// These never propagate to callers of `write`; the dispatcher converts them
/// into failure patches and attaches the message to the affected entries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    /// Content violates a length or format constraint.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Transport failure, server failure, or a response with an unexpected code.
    #[error("network error: {message}")]
    Network { message: String },

    /// The entity was deleted or changed concurrently on the server.
    #[error("conflict (jsonCode {code}): {message}")]
    Conflict { code: i64, message: String },
}

impl MutationError {
    /// The message shown to the user next to the affected entry.
    pub fn message(&self) -> &str {
        match self {
            MutationError::Validation { message }
            | MutationError::Network { message }
            | MutationError::Conflict { message, .. } => message,
        }
    }
}

/// Local errors returned synchronously by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The mutation was rejected before any optimistic patch was applied.
    #[error("invalid mutation {name}: {message}")]
    Validation { name: String, message: String },

    /// The local store refused a write (e.g. it was torn down).
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The command queue was shut down.
    #[error("command queue is closed")]
    QueueClosed,
}

/// Errors produced by a [`Transport`](crate::Transport).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request never reached the server or the connection dropped.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The server answered with a non-success HTTP status.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The server answered, but the body was not a valid response.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Connection failures and 5xx statuses are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Connection(_) => true,
            TransportError::Status(status) => *status >= 500,
            TransportError::Malformed(_) => false,
        }
    }
}
