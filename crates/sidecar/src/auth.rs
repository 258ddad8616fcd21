//! Inbound authentication guard for axum routers.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};

use crate::credential::CredentialVerifier;

/// Body message of the 401 response.
pub const UNAUTHORIZED_MESSAGE: &str = "Service not authorized";

/// Middleware comparing the `Authorization` header against the verifier.
///
/// Mismatched or missing credentials get `401 {"message": "Service not authorized"}`;
/// anything else is passed on unchanged.
pub async fn authenticate_inbound(
    State(verifier): State<Arc<dyn CredentialVerifier>>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let header_present = presented.is_some();
    let authorized = presented.is_some_and(|credential| verifier.verify(credential));

    if authorized {
        return next.run(request).await;
    }

    metrics::counter!("sidecar_unauthorized_total").increment(1);
    tracing::warn!(
        path = %request.uri().path(),
        header_present,
        "rejected unauthorized request"
    );
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "message": UNAUTHORIZED_MESSAGE })),
    )
        .into_response()
}

/// Guards every route of `router` with [`authenticate_inbound`].
pub fn require_credential<S>(router: Router<S>, verifier: Arc<dyn CredentialVerifier>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(verifier, authenticate_inbound))
}
