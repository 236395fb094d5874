//! Error taxonomy for icelake.
//!
//! Three classes: a bad request never worth retrying (`UserInput`), a
//! retryable condition (`Transient`), and a bug or constraint violation that
//! retrying won't fix (`Permanent`). The catalog retry wrapper in
//! `icelake-io::retry` consults this classification directly instead of
//! pattern-matching driver error strings at every call site.

use thiserror::Error;

/// Errors surfaced across crate boundaries in icelake.
#[derive(Debug, Error)]
pub enum IcelakeError {
    /// Malformed input, empty batches, partition-function misuse. Always a
    /// 4xx at the HTTP boundary; never retried.
    #[error("{0}")]
    UserInput(String),

    /// Transaction-serialization conflicts, deadline exceeded, object-store
    /// hiccups. Retried by the transactional wrapper up to its limit.
    #[error("{0}")]
    Transient(String),

    /// Unique-key violations, undefined columns, internal invariant
    /// breakage. Surfaced as a 5xx and never retried.
    #[error("{0}")]
    Permanent(String),
}

impl IcelakeError {
    pub fn user_input(msg: impl Into<String>) -> Self {
        Self::UserInput(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }

    /// Whether the transactional retry wrapper should retry this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IcelakeError::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, IcelakeError>;
