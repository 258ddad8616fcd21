//! Sidecar transport for synchronous service-to-service calls.
//!
//! Outbound, [`Sidecar::send_request`] resolves the target through the
//! [`registry`] and issues an HTTP call carrying a single
//! `Authorization: <secret>` header. Inbound, [`auth::authenticate_inbound`]
//! is an axum middleware that rejects requests whose credential does not
//! pass the configured [`CredentialVerifier`].
//!
//! Authentication is deliberately minimal: one shared secret per service
//! pair, kept in process memory. Transport encryption is expected to come
//! from the network (private network or externally provided mutual TLS).

pub mod auth;
pub mod credential;
pub mod error;
pub mod request;
pub mod sidecar;

pub use auth::{UNAUTHORIZED_MESSAGE, authenticate_inbound, require_credential};
pub use credential::{CredentialVerifier, SharedSecret};
pub use error::{Result, SidecarError};
pub use request::{RequestConfig, RequestTarget, SidecarResponse};
pub use sidecar::Sidecar;
