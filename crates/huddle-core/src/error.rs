use thiserror::Error;

/// Mutation-path error taxonomy. Broadcast delivery failures are not here:
/// they are logged per recipient inside the router and never surface to the
/// caller or roll back the committed write.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Missing or malformed input, rejected before any mutation
    #[error("invalid request: {0}")]
    Validation(String),

    /// Record missing, soft-deleted, or outside the caller's org scope
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Caller lacks membership or ownership for this operation
    #[error("not permitted: {0}")]
    Forbidden(String),

    /// Durable store unavailable; operation aborted, caller must resend
    #[error("storage unavailable: {0}")]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ChatError>;
