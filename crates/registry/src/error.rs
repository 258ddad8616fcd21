use common::TokenError;
use thiserror::Error;

/// Errors that can occur when publishing or resolving services.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry was asked to register without a record, or the record
    /// itself is unusable.
    #[error("Registry configuration error: {0}")]
    Configuration(String),

    /// No record, or no endpoint key, exists for the lookup.
    #[error("Not found in registry: {0}")]
    NotFound(String),

    /// The endpoint token could not be parsed.
    #[error("Invalid endpoint token: {0}")]
    InvalidToken(#[from] TokenError),

    /// The etcd coordination store failed.
    #[error("Coordination store error: {0}")]
    Store(#[from] etcd_client::Error),

    /// The stored endpoint map is not valid JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
