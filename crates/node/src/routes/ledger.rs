//! Ledger inspection endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::ledger::{CommittedEntry, LedgerEntry, StagedLedger};

#[derive(Serialize)]
pub struct LedgerResponse {
    pub committed: Vec<CommittedEntry>,
    pub staged: Vec<LedgerEntry>,
}

/// GET /ledger: committed entries and entries staged by open transactions.
pub async fn list(State(ledger): State<Arc<StagedLedger>>) -> Json<LedgerResponse> {
    Json(LedgerResponse {
        committed: ledger.committed().await,
        staged: ledger.staged().await,
    })
}
