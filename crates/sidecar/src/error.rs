use registry::RegistryError;
use thiserror::Error;

/// Errors that can occur when sending or authenticating sidecar requests.
#[derive(Debug, Error)]
pub enum SidecarError {
    /// The registry holds no address for the target service.
    #[error("Host not found for service '{0}' on the registry")]
    HostNotFound(String),

    /// The registry lookup itself failed.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// The HTTP call failed or returned a non-success status.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The payload could not be encoded as JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An inbound credential did not match.
    #[error("Service not authorized")]
    Unauthorized,
}

/// Result type for sidecar operations.
pub type Result<T> = std::result::Result<T, SidecarError>;
