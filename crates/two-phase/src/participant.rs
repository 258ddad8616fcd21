use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Context recorded when a participant call fails at the transport level.
pub const SERVER_ERROR_CTX: &str = "Server error";

/// Where a participant's phase endpoint lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRef {
    /// Service name as registered in the registry.
    pub service: String,
    /// Path of the phase endpoint on that service.
    pub path: String,
    /// `Authorization` value the participant expects.
    pub auth: String,
}

/// One party in a transaction, with the data it should act on.
///
/// Supplied per transaction by the caller and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitParticipant<D> {
    pub endpoint: EndpointRef,
    pub data: D,
}

impl<D> CommitParticipant<D> {
    pub fn new(
        service: impl Into<String>,
        path: impl Into<String>,
        auth: impl Into<String>,
        data: D,
    ) -> Self {
        Self {
            endpoint: EndpointRef {
                service: service.into(),
                path: path.into(),
                auth: auth.into(),
            },
            data,
        }
    }
}

/// How one participant answered one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantOutcome {
    pub service: String,
    pub success: bool,
    /// On success the full response body; on failure the participant's
    /// returned context, or `"Server error"` when the call itself failed.
    pub ctx: Option<Value>,
}

impl ParticipantOutcome {
    pub fn succeeded(service: impl Into<String>, response: Value) -> Self {
        Self {
            service: service.into(),
            success: true,
            ctx: Some(response),
        }
    }

    pub fn failed(service: impl Into<String>, ctx: Option<Value>) -> Self {
        Self {
            service: service.into(),
            success: false,
            ctx,
        }
    }

    /// A failure caused by the transport rather than the participant.
    pub fn server_error(service: impl Into<String>) -> Self {
        Self::failed(service, Some(Value::String(SERVER_ERROR_CTX.to_string())))
    }
}
