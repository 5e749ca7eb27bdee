//! Error taxonomy for batched requests.

use thiserror::Error;

/// Errors delivered on a request's delivery channel.
///
/// The same error value is fanned out to every member of an affected
/// group, so the enum is `Clone` and carries backend failures as
/// rendered text rather than source errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// The backend reported a failure for this group (or, for a
    /// whole-pipeline failure, for the entire batch).
    #[error("backend error: {0}")]
    Backend(String),

    /// The request was submitted while the batcher was shutting down,
    /// or its delivery was cut short by shutdown.
    #[error("batcher is shutting down")]
    ShuttingDown,

    /// The serving backend cannot express this operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

/// Result type for batched operations.
pub type BatchResult<T> = Result<T, BatchError>;
