//! Orchestrating side of the protocol.

use std::sync::Arc;
use std::time::Instant;

use common::{HttpMethod, TransactionId};
use futures_util::future::join_all;
use registry::CoordinationStore;
use serde::Serialize;
use serde_json::Value;
use sidecar::{RequestConfig, Sidecar};

use crate::participant::{CommitParticipant, ParticipantOutcome};
use crate::phase::{CommitPhase, PhaseMessage};
use crate::state::{TransactionOutcome, TransactionState};

/// Drives prepare → commit | abort across participants via the sidecar.
///
/// Holds no state of its own; every transaction lives on the call stack of
/// [`execute`](Self::execute). Participant calls within a phase run
/// concurrently and a failure of one never short-circuits the others.
pub struct TransactionCoordinator<S: CoordinationStore> {
    sidecar: Arc<Sidecar<S>>,
}

impl<S: CoordinationStore> Clone for TransactionCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            sidecar: self.sidecar.clone(),
        }
    }
}

impl<S: CoordinationStore> TransactionCoordinator<S> {
    pub fn new(sidecar: Arc<Sidecar<S>>) -> Self {
        Self { sidecar }
    }

    pub fn sidecar(&self) -> &Sidecar<S> {
        &self.sidecar
    }

    /// Runs one transaction and reports only whether it committed.
    pub async fn run_transaction<D>(&self, participants: &[CommitParticipant<D>]) -> bool
    where
        D: Serialize + Sync,
    {
        self.execute(participants).await.committed()
    }

    /// Runs one transaction and returns every phase's results.
    ///
    /// Commit is only sent if every prepare succeeded. If prepare or commit
    /// has any failure, abort is sent to every participant with the first
    /// failing participant's context as `data.ctx`; abort answers are
    /// recorded but not checked.
    #[tracing::instrument(
        skip_all,
        fields(transaction_id = tracing::field::Empty, participants = participants.len())
    )]
    pub async fn execute<D>(&self, participants: &[CommitParticipant<D>]) -> TransactionOutcome
    where
        D: Serialize + Sync,
    {
        let started = Instant::now();
        let mut outcome = TransactionOutcome::new(TransactionId::new());
        tracing::Span::current().record("transaction_id", tracing::field::display(outcome.id));

        for phase in [CommitPhase::Prepare, CommitPhase::Commit] {
            outcome.transition(match phase {
                CommitPhase::Prepare => TransactionState::Preparing,
                _ => TransactionState::Committing,
            });

            let results = self.propagate_phase(phase, participants, None).await;
            let failure = results.iter().find(|r| !r.success).map(|r| r.ctx.clone());
            outcome.record(phase, results);

            if let Some(ctx) = failure {
                tracing::warn!(%phase, "phase failed, aborting transaction");
                self.abort_all(&mut outcome, phase, participants, ctx).await;
                finish(&outcome, started);
                return outcome;
            }
        }

        outcome.transition(TransactionState::Committed);
        tracing::info!("transaction committed");
        finish(&outcome, started);
        outcome
    }

    async fn abort_all<D>(
        &self,
        outcome: &mut TransactionOutcome,
        failed_phase: CommitPhase,
        participants: &[CommitParticipant<D>],
        ctx: Option<Value>,
    ) where
        D: Serialize + Sync,
    {
        outcome.transition(TransactionState::Aborting { failed_phase });
        let results = self
            .propagate_phase(CommitPhase::Abort, participants, ctx.as_ref())
            .await;
        let unacknowledged = results.iter().filter(|r| !r.success).count();
        if unacknowledged > 0 {
            tracing::warn!(unacknowledged, "abort not acknowledged by every participant");
        }
        outcome.record(CommitPhase::Abort, results);
        outcome.transition(TransactionState::Aborted { failed_phase });
    }

    /// Sends one phase to every participant concurrently and waits for all
    /// answers, in participant order.
    pub async fn propagate_phase<D>(
        &self,
        phase: CommitPhase,
        participants: &[CommitParticipant<D>],
        ctx: Option<&Value>,
    ) -> Vec<ParticipantOutcome>
    where
        D: Serialize + Sync,
    {
        join_all(
            participants
                .iter()
                .map(|participant| self.send_phase(phase, participant, ctx)),
        )
        .await
    }

    async fn send_phase<D>(
        &self,
        phase: CommitPhase,
        participant: &CommitParticipant<D>,
        ctx: Option<&Value>,
    ) -> ParticipantOutcome
    where
        D: Serialize + Sync,
    {
        let endpoint = &participant.endpoint;
        let data = match serde_json::to_value(&participant.data) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(
                    service = %endpoint.service,
                    error = %e,
                    "participant data is not serializable"
                );
                return ParticipantOutcome::server_error(&endpoint.service);
            }
        };

        let config = RequestConfig::path(
            &endpoint.service,
            &endpoint.path,
            HttpMethod::Post,
            &endpoint.auth,
        );
        let message = PhaseMessage::new(phase, data, ctx);

        let outcome = match self.sidecar.send_request(&config, &message).await {
            Ok(response) if response.data.get("success") == Some(&Value::Bool(true)) => {
                ParticipantOutcome::succeeded(&endpoint.service, response.data)
            }
            Ok(response) => {
                let ctx = response.data.get("ctx").cloned();
                ParticipantOutcome::failed(&endpoint.service, ctx)
            }
            Err(e) => {
                tracing::error!(
                    service = %endpoint.service,
                    %phase,
                    error = %e,
                    "participant call failed"
                );
                ParticipantOutcome::server_error(&endpoint.service)
            }
        };

        if !outcome.success {
            metrics::counter!("two_phase_participant_failures_total", "phase" => phase.as_str())
                .increment(1);
        }
        outcome
    }
}

fn finish(outcome: &TransactionOutcome, started: Instant) {
    let label = if outcome.committed() {
        "committed"
    } else {
        "aborted"
    };
    metrics::counter!("two_phase_transactions_total", "outcome" => label).increment(1);
    metrics::histogram!("two_phase_duration_seconds").record(started.elapsed().as_secs_f64());
}
