//! Two-phase commit across services reached through the sidecar.
//!
//! The orchestrating side drives a fixed protocol:
//!
//! ```text
//! prepare (all) ──┬── any failure ──────────────► abort (all) ──► false
//!                 └── all ok ──► commit (all) ──┬── any failure ──► abort (all) ──► false
//!                                               └── all ok ─────────────────────► true
//! ```
//!
//! Every phase is fanned out to all participants concurrently and the phase
//! result is only evaluated once each participant has answered. Nothing is
//! persisted: the outcome lives as long as the call that produced it, so a
//! process restart mid-transaction loses all context.
//!
//! The participating side mounts [`phase_handler`] on one route and supplies
//! [`PhaseActions`].
//!
//! # Abort after a partial commit
//!
//! When the commit round fails for some participants, the others may already
//! have committed. They receive the same best-effort `abort` message as
//! everyone else; whether that means "undo" is up to each participant's
//! `abort` implementation. There is no rollback log.
//! [`TransactionOutcome::partially_committed`] reports who is affected.

pub mod coordinator;
pub mod handler;
pub mod participant;
pub mod phase;
pub mod state;

pub use common::TransactionId;
pub use coordinator::TransactionCoordinator;
pub use handler::{PhaseActions, handle_phase, phase_handler};
pub use participant::{CommitParticipant, EndpointRef, ParticipantOutcome};
pub use phase::{CommitPhase, PhaseMessage, PhaseReply, PhaseResult};
pub use state::{PhaseRecord, TransactionOutcome, TransactionState};
