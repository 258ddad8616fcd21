//! Registry lookups.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use registry::CoordinationStore;
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct ServiceResponse {
    pub name: String,
    pub url: String,
}

#[derive(Serialize)]
pub struct EndpointResponse {
    pub token: String,
    pub url: String,
}

/// GET /services/{name}: the base URL `name` registered.
pub async fn get<S: CoordinationStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
) -> Result<Json<ServiceResponse>, ApiError> {
    let url = state.registry().resolve_service(&name).await?;
    Ok(Json(ServiceResponse { name, url }))
}

/// GET /endpoints/{token}: the full URL behind an endpoint token.
pub async fn resolve<S: CoordinationStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(token): Path<String>,
) -> Result<Json<EndpointResponse>, ApiError> {
    let url = state.registry().resolve_endpoint(&token).await?;
    Ok(Json(EndpointResponse { token, url }))
}
