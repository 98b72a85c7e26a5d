//! Error types for ladico-core.

use thiserror::Error;

/// Result type alias using SessionStateError.
pub type Result<T> = std::result::Result<T, SessionStateError>;

/// Errors raised when a session mutation does not fit its current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionStateError {
    #[error("question index {index} out of range for {len} answers")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("session already completed")]
    AlreadyCompleted,
}
