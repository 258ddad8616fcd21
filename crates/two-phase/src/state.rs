//! Transaction state machine and outcome.

use common::TransactionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::participant::ParticipantOutcome;
use crate::phase::CommitPhase;

/// Progress of one orchestrated transaction.
///
/// State transitions:
/// ```text
/// Started ──► Preparing ──┬──► Committing ──┬──► Committed
///                         │                 └──► Aborting{Commit} ──► Aborted{Commit}
///                         └──► Aborting{Prepare} ──► Aborted{Prepare}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TransactionState {
    /// Created, no phase sent yet.
    #[default]
    Started,

    /// Prepare messages are out.
    Preparing,

    /// Every participant prepared; commit messages are out.
    Committing,

    /// A phase failed; abort messages are out.
    Aborting { failed_phase: CommitPhase },

    /// Every participant committed (terminal state).
    Committed,

    /// The abort round finished (terminal state).
    Aborted { failed_phase: CommitPhase },
}

impl TransactionState {
    /// Returns true if moving to `next` follows the protocol.
    pub fn can_transition_to(&self, next: &TransactionState) -> bool {
        use TransactionState::*;
        match (self, next) {
            (Started, Preparing) => true,
            (Preparing, Committing) => true,
            (Preparing, Aborting { failed_phase }) => *failed_phase == CommitPhase::Prepare,
            (Committing, Committed) => true,
            (Committing, Aborting { failed_phase }) => *failed_phase == CommitPhase::Commit,
            (Aborting { failed_phase: a }, Aborted { failed_phase: b }) => a == b,
            _ => false,
        }
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Committed | TransactionState::Aborted { .. }
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Started => "Started",
            TransactionState::Preparing => "Preparing",
            TransactionState::Committing => "Committing",
            TransactionState::Aborting { .. } => "Aborting",
            TransactionState::Committed => "Committed",
            TransactionState::Aborted { .. } => "Aborted",
        }
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aborting { failed_phase } | Self::Aborted { failed_phase } => {
                write!(f, "{} (failed in {})", self.as_str(), failed_phase)
            }
            _ => write!(f, "{}", self.as_str()),
        }
    }
}

/// All participants' answers to one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: CommitPhase,
    pub results: Vec<ParticipantOutcome>,
}

impl PhaseRecord {
    /// True if every participant answered with success.
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    /// The first failing participant, in participant order.
    pub fn first_failure(&self) -> Option<&ParticipantOutcome> {
        self.results.iter().find(|r| !r.success)
    }
}

/// Everything observed while driving one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionOutcome {
    pub id: TransactionId,
    pub state: TransactionState,
    /// Phases in the order they were sent.
    pub phases: Vec<PhaseRecord>,
}

impl TransactionOutcome {
    pub fn new(id: TransactionId) -> Self {
        Self {
            id,
            state: TransactionState::Started,
            phases: Vec::new(),
        }
    }

    /// Moves to `next`.
    ///
    /// # Panics
    ///
    /// In debug builds, if the transition is not part of the protocol.
    pub fn transition(&mut self, next: TransactionState) {
        debug_assert!(
            self.state.can_transition_to(&next),
            "invalid transaction transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }

    pub fn record(&mut self, phase: CommitPhase, results: Vec<ParticipantOutcome>) {
        self.phases.push(PhaseRecord { phase, results });
    }

    /// True if the whole transaction committed.
    pub fn committed(&self) -> bool {
        self.state == TransactionState::Committed
    }

    /// The record of `phase`, if it was sent.
    pub fn phase(&self, phase: CommitPhase) -> Option<&PhaseRecord> {
        self.phases.iter().find(|record| record.phase == phase)
    }

    /// Context forwarded with the abort round, if one was sent.
    pub fn abort_context(&self) -> Option<&Value> {
        let failed_phase = match self.state {
            TransactionState::Aborting { failed_phase }
            | TransactionState::Aborted { failed_phase } => failed_phase,
            _ => return None,
        };
        self.phase(failed_phase)?.first_failure()?.ctx.as_ref()
    }

    /// Services whose commit succeeded although the transaction aborted.
    ///
    /// These participants only received a plain `abort` afterwards; whether
    /// they undid anything depends on their own abort handler.
    pub fn partially_committed(&self) -> Vec<&str> {
        if self.state
            != (TransactionState::Aborted {
                failed_phase: CommitPhase::Commit,
            })
        {
            return Vec::new();
        }
        self.phase(CommitPhase::Commit)
            .map(|record| {
                record
                    .results
                    .iter()
                    .filter(|r| r.success)
                    .map(|r| r.service.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }
}
