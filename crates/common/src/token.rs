//! Endpoint tokens: `{service}.{path-segment}...`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when parsing an [`EndpointToken`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The token has no service segment.
    #[error("Endpoint token '{0}' has an empty service segment")]
    EmptyService(String),

    /// The token names a service but no endpoint inside it.
    #[error("Endpoint token '{0}' has no endpoint segment")]
    MissingEndpoint(String),
}

/// A dot-delimited reference to one endpoint of one service.
///
/// The first segment is always the service name. The remaining segments,
/// rejoined with dots, form the key looked up in that service's endpoint map:
///
/// ```text
/// billing.charge.post
/// ^^^^^^^ ^^^^^^^^^^^
/// service endpoint key
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EndpointToken {
    service: String,
    endpoint: String,
}

impl EndpointToken {
    /// Parses a token string.
    pub fn parse(raw: &str) -> Result<Self, TokenError> {
        let (service, endpoint) = raw
            .split_once('.')
            .ok_or_else(|| TokenError::MissingEndpoint(raw.to_string()))?;

        if service.is_empty() {
            return Err(TokenError::EmptyService(raw.to_string()));
        }
        if endpoint.is_empty() {
            return Err(TokenError::MissingEndpoint(raw.to_string()));
        }

        Ok(Self {
            service: service.to_string(),
            endpoint: endpoint.to_string(),
        })
    }

    /// Builds a token from its two halves.
    pub fn new(service: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            endpoint: endpoint.into(),
        }
    }

    /// The service name (first segment).
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The key inside the service's endpoint map.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl FromStr for EndpointToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EndpointToken {
    type Error = TokenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EndpointToken> for String {
    fn from(token: EndpointToken) -> Self {
        token.to_string()
    }
}

impl std::fmt::Display for EndpointToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.service, self.endpoint)
    }
}
