//! Participant side: one endpoint answering every phase.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Json;
use axum::extract::State;
use axum::routing::{MethodRouter, post};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::phase::{CommitPhase, PhaseReply, PhaseResult};

/// Local actions a participant service runs for each phase.
///
/// `Data` is decoded from the message's `data` field. Object-shaped data
/// carries the orchestrator's `ctx` as a field on abort; any other shape is
/// decoded from the `value` of its `{value, ctx}` envelope.
#[async_trait]
pub trait PhaseActions: Send + Sync + 'static {
    type Data: DeserializeOwned + Send;

    async fn prepare(&self, data: Self::Data) -> PhaseResult;

    async fn commit(&self, data: Self::Data) -> PhaseResult;

    async fn abort(&self, data: Self::Data) -> PhaseResult;
}

/// POST handler dispatching on the body's `phase` field.
///
/// Always answers `200` with `{"success": bool}`; an unknown phase or data
/// that does not decode into `A::Data` answers `{"success": false}` without
/// running any action.
pub async fn handle_phase<A: PhaseActions>(
    State(actions): State<Arc<A>>,
    Json(body): Json<Value>,
) -> Json<PhaseReply> {
    let Some(phase) = body
        .get("phase")
        .and_then(Value::as_str)
        .and_then(CommitPhase::parse)
    else {
        tracing::warn!(phase = ?body.get("phase"), "unrecognized phase");
        return Json(PhaseResult::failed().into());
    };

    let data = body.get("data").cloned().unwrap_or(Value::Null);
    let data: A::Data = match decode_data(data) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(%phase, error = %e, "phase data did not decode");
            return Json(PhaseResult::failed().into());
        }
    };

    tracing::info!(%phase, "running phase");
    let result = match phase {
        CommitPhase::Prepare => actions.prepare(data).await,
        CommitPhase::Commit => actions.commit(data).await,
        CommitPhase::Abort => actions.abort(data).await,
    };
    tracing::info!(%phase, success = result.success, "phase finished");
    metrics::counter!(
        "two_phase_phases_handled_total",
        "phase" => phase.as_str(),
        "success" => if result.success { "true" } else { "false" }
    )
    .increment(1);

    Json(result.into())
}

/// Decodes phase data, falling back to the payload inside a `{value, ctx}`
/// envelope when the data itself does not fit.
fn decode_data<D: DeserializeOwned>(data: Value) -> serde_json::Result<D> {
    let err = match serde_json::from_value(data.clone()) {
        Ok(decoded) => return Ok(decoded),
        Err(e) => e,
    };
    match unwrap_envelope(data) {
        Some(inner) => serde_json::from_value(inner),
        None => Err(err),
    }
}

/// The payload of a ctx-carrying envelope; a lone `ctx` wraps null data.
fn unwrap_envelope(data: Value) -> Option<Value> {
    let Value::Object(mut fields) = data else {
        return None;
    };
    if !fields.contains_key("ctx") {
        return None;
    }
    match fields.len() {
        1 => Some(Value::Null),
        2 => fields.remove("value"),
        _ => None,
    }
}

/// Builds the single phase endpoint, ready to mount with `Router::route`.
pub fn phase_handler<A, S>(actions: Arc<A>) -> MethodRouter<S>
where
    A: PhaseActions,
    S: Clone + Send + Sync + 'static,
{
    post(handle_phase::<A>).with_state(actions)
}
