//! Outbound calls and inbound credential checks for one service.

use std::sync::Arc;
use std::time::Instant;

use common::HttpMethod;
use registry::{CoordinationStore, RegistryError, ServiceRegistry};
use reqwest::header::AUTHORIZATION;
use serde::Serialize;

use crate::credential::{CredentialVerifier, SharedSecret};
use crate::request::{RequestConfig, RequestTarget, SidecarResponse};
use crate::{Result, SidecarError};

/// Performs authenticated HTTP calls to services found in the registry.
///
/// Holds no state beyond the registry handle, the inbound credential
/// verifier and a pooled HTTP client.
pub struct Sidecar<S: CoordinationStore> {
    registry: ServiceRegistry<S>,
    verifier: Arc<dyn CredentialVerifier>,
    client: reqwest::Client,
}

impl<S: CoordinationStore> Sidecar<S> {
    /// Creates a sidecar with a custom inbound credential verifier.
    pub fn new(registry: ServiceRegistry<S>, verifier: impl CredentialVerifier + 'static) -> Self {
        Self {
            registry,
            verifier: Arc::new(verifier),
            client: reqwest::Client::new(),
        }
    }

    /// Creates a sidecar whose inbound guard accepts exactly `secret`.
    pub fn with_shared_secret(registry: ServiceRegistry<S>, secret: impl Into<String>) -> Self {
        Self::new(registry, SharedSecret::new(secret))
    }

    /// Replaces the HTTP client, e.g. to set a request timeout.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn registry(&self) -> &ServiceRegistry<S> {
        &self.registry
    }

    /// The verifier used by [`authenticate`](Self::authenticate), shareable
    /// with [`crate::auth::authenticate_inbound`].
    pub fn verifier(&self) -> Arc<dyn CredentialVerifier> {
        self.verifier.clone()
    }

    /// Checks an inbound `Authorization` header value.
    ///
    /// A missing header is rejected like a wrong one.
    pub fn authenticate(&self, presented: Option<&str>) -> Result<()> {
        match presented {
            Some(credential) if self.verifier.verify(credential) => Ok(()),
            _ => Err(SidecarError::Unauthorized),
        }
    }

    async fn resolve_url(&self, target: &RequestTarget) -> Result<String> {
        match target {
            RequestTarget::Path { service, path } => {
                let host = match self.registry.resolve_service(service).await {
                    Ok(host) if !host.is_empty() => host,
                    Ok(_) | Err(RegistryError::NotFound(_)) => {
                        return Err(SidecarError::HostNotFound(service.clone()));
                    }
                    Err(e) => return Err(e.into()),
                };
                Ok(format!("{host}{path}"))
            }
            RequestTarget::Token(token) => Ok(self.registry.resolve_token(token).await?),
        }
    }

    /// Sends `payload` as a JSON body to the configured target. A payload
    /// that serializes to `null`, such as `&()`, sends no body at all.
    ///
    /// Fails with [`SidecarError::HostNotFound`] before any network call if
    /// the registry has no address for the service. Transport failures and
    /// non-2xx statuses surface as [`SidecarError::Network`]; otherwise the
    /// response body is returned as-is.
    #[tracing::instrument(
        skip(self, config, payload),
        fields(service = %config.target.service(), method = %config.method)
    )]
    pub async fn send_request<P>(
        &self,
        config: &RequestConfig,
        payload: &P,
    ) -> Result<SidecarResponse>
    where
        P: Serialize + ?Sized,
    {
        let url = self.resolve_url(&config.target).await?;
        let body = serde_json::to_value(payload)?;
        let started = Instant::now();

        let mut request = self
            .client
            .request(to_reqwest_method(config.method), &url)
            .header(AUTHORIZATION, config.auth_secret.as_str());
        if !body.is_null() {
            request = request.json(&body);
        }

        let result = request
            .send()
            .await
            .and_then(|response| response.error_for_status());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                metrics::counter!("sidecar_requests_total", "outcome" => "error").increment(1);
                tracing::warn!(%url, error = %e, "sidecar request failed");
                return Err(e.into());
            }
        };

        let body = response.bytes().await?;
        metrics::counter!("sidecar_requests_total", "outcome" => "ok").increment(1);
        metrics::histogram!("sidecar_request_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::debug!(%url, bytes = body.len(), "sidecar request completed");

        Ok(SidecarResponse::from_body(&body))
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}
