use common::{EndpointToken, HttpMethod};
use serde::{Deserialize, Serialize};

/// Where a sidecar request goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestTarget {
    /// A service's base URL (by name) followed by a literal path.
    Path { service: String, path: String },
    /// A registered endpoint token.
    Token(EndpointToken),
}

impl RequestTarget {
    /// The service the request is addressed to.
    pub fn service(&self) -> &str {
        match self {
            RequestTarget::Path { service, .. } => service,
            RequestTarget::Token(token) => token.service(),
        }
    }
}

/// One outbound call, built per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    pub target: RequestTarget,
    #[serde(default)]
    pub method: HttpMethod,
    /// Sent verbatim as the `Authorization` header.
    pub auth_secret: String,
}

impl RequestConfig {
    /// Targets `path` on the named service.
    pub fn path(
        service: impl Into<String>,
        path: impl Into<String>,
        method: HttpMethod,
        auth_secret: impl Into<String>,
    ) -> Self {
        Self {
            target: RequestTarget::Path {
                service: service.into(),
                path: path.into(),
            },
            method,
            auth_secret: auth_secret.into(),
        }
    }

    /// Targets a registered endpoint token.
    pub fn token(token: EndpointToken, method: HttpMethod, auth_secret: impl Into<String>) -> Self {
        Self {
            target: RequestTarget::Token(token),
            method,
            auth_secret: auth_secret.into(),
        }
    }
}

/// The remote response body, uninterpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidecarResponse {
    pub data: serde_json::Value,
}

impl SidecarResponse {
    /// Decodes a response body: JSON when it parses, otherwise the raw text
    /// as a JSON string. An empty body is `null`.
    pub fn from_body(body: &[u8]) -> Self {
        let data = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(body).unwrap_or_else(|_| {
                serde_json::Value::String(String::from_utf8_lossy(body).into_owned())
            })
        };
        Self { data }
    }
}
