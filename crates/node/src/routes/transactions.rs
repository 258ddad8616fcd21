//! Orchestrates a two-phase commit across the participants in the request.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use registry::CoordinationStore;
use serde::Deserialize;
use serde_json::Value;
use two_phase::{CommitParticipant, TransactionOutcome};

use crate::error::ApiError;
use crate::{AppState, PHASE_PATH};

#[derive(Deserialize)]
pub struct TransactionRequest {
    pub participants: Vec<ParticipantRequest>,
}

#[derive(Deserialize)]
pub struct ParticipantRequest {
    pub service: String,
    #[serde(default = "default_path")]
    pub path: String,
    pub auth: String,
    #[serde(default)]
    pub data: Value,
}

fn default_path() -> String {
    PHASE_PATH.to_string()
}

impl From<ParticipantRequest> for CommitParticipant<Value> {
    fn from(request: ParticipantRequest) -> Self {
        CommitParticipant::new(request.service, request.path, request.auth, request.data)
    }
}

/// POST /transactions: runs the transaction and returns every phase's
/// results. A transaction that aborted is still a `200`; see `state`.
pub async fn run<S: CoordinationStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(request): Json<TransactionRequest>,
) -> Result<Json<TransactionOutcome>, ApiError> {
    if request.participants.is_empty() {
        return Err(ApiError::BadRequest(
            "a transaction needs at least one participant".to_string(),
        ));
    }

    let participants: Vec<CommitParticipant<Value>> =
        request.participants.into_iter().map(Into::into).collect();
    let outcome = state.coordinator.execute(&participants).await;
    tracing::info!(
        transaction_id = %outcome.id,
        state = %outcome.state,
        "transaction finished"
    );
    Ok(Json(outcome))
}
