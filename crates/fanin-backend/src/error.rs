//! Backend error types.

use fanin_batch::BatchError;
use thiserror::Error;

/// Backend-specific errors.
///
/// These are surfaced upward unchanged; the executors never retry.
/// Crossing into the engine they are rendered into
/// [`BatchError::Backend`] so one error value can be fanned out to every
/// coalesced caller.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Could not reach the backend (pool checkout, connect, transport).
    #[error("connection error: {message}")]
    Connection { message: String },

    /// The backend rejected or failed an individual command.
    #[error("command failed: {message}")]
    Command { message: String },

    /// The backend replied with something the adapter cannot interpret.
    #[error("unexpected reply: {message}")]
    UnexpectedReply { message: String },
}

impl BackendError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn command(message: impl Into<String>) -> Self {
        Self::Command {
            message: message.into(),
        }
    }

    pub fn unexpected_reply(message: impl Into<String>) -> Self {
        Self::UnexpectedReply {
            message: message.into(),
        }
    }
}

impl From<BackendError> for BatchError {
    fn from(err: BackendError) -> Self {
        BatchError::Backend(err.to_string())
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
