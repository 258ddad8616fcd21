//! Saga error types.

use thiserror::Error;

/// Boxed error returned by step handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while publishing or consuming saga messages.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The broker rejected an operation or the connection failed.
    #[error("Broker error: {0}")]
    Broker(String),

    /// A message or payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A step handler returned an error or panicked.
    #[error("Step handler failed: {0}")]
    Handler(String),
}

impl SagaError {
    pub(crate) fn broker(err: impl std::fmt::Display) -> Self {
        Self::Broker(err.to_string())
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
