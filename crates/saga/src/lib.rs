//! Saga choreography over a message broker.
//!
//! Each service owns one queue and registers *steps* on it: an event name
//! with a forward handler and a compensating (back) handler. Handlers push
//! the saga along by invoking steps on other services' queues, or roll it
//! back by invoking their `back` direction. No component holds the saga's
//! overall state.
//!
//! ```text
//!   orders queue                        payments queue
//!   place_order_forward ──invoke_step──► charge_forward
//!                                           │ fails
//!   place_order_back ◄───invoke_step────────┘
//! ```
//!
//! Delivery is at-least-once: handlers must tolerate seeing the same
//! message again after a failure or a crash before acknowledgement.

pub mod broker;
pub mod choreographer;
pub mod error;
pub mod memory;
pub mod message;
pub mod nats;
pub mod redelivery;

pub use broker::{Acker, Delivery, DeliveryStream, MessageBroker};
pub use choreographer::SagaChoreographer;
pub use error::{BoxError, Result, SagaError};
pub use memory::InMemoryBroker;
pub use message::{BACK_SUFFIX, Direction, FORWARD_SUFFIX, SagaMessage};
pub use nats::JetStreamBroker;
pub use redelivery::{DEAD_LETTER_SUFFIX, DEFAULT_MAX_DELIVERIES, RedeliveryPolicy};
