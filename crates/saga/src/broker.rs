//! Message broker abstraction.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::Result;

/// Settles one delivery with the broker it came from.
#[async_trait]
pub trait Acker: Send {
    async fn ack(self: Box<Self>) -> Result<()>;

    async fn nack(self: Box<Self>) -> Result<()>;
}

/// A message handed to a consumer, awaiting acknowledgement.
///
/// Dropping a delivery without settling it leaves it to the broker's own
/// redelivery rules.
pub struct Delivery {
    pub body: Vec<u8>,
    /// How many times this message has been delivered, starting at 1.
    pub delivery_count: u64,
    acker: Box<dyn Acker>,
}

impl Delivery {
    pub fn new(body: Vec<u8>, delivery_count: u64, acker: Box<dyn Acker>) -> Self {
        Self {
            body,
            delivery_count,
            acker,
        }
    }

    /// Marks the message as processed; it will not be delivered again.
    pub async fn ack(self) -> Result<()> {
        self.acker.ack().await
    }

    /// Returns the message to its queue for redelivery.
    pub async fn nack(self) -> Result<()> {
        self.acker.nack().await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("body", &String::from_utf8_lossy(&self.body))
            .field("delivery_count", &self.delivery_count)
            .finish_non_exhaustive()
    }
}

/// Unbounded stream of deliveries from one queue.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery>> + Send>>;

/// A broker offering durable named queues with explicit acknowledgement.
#[async_trait]
pub trait MessageBroker: Send + Sync + 'static {
    /// Declares `queue`, creating it if it does not exist.
    async fn assert_queue(&self, queue: &str) -> Result<()>;

    /// Appends `body` to `queue`.
    async fn publish(&self, queue: &str, body: Vec<u8>) -> Result<()>;

    /// Starts consuming `queue`. Each message is delivered to one consumer
    /// at a time until it is acknowledged.
    async fn consume(&self, queue: &str) -> Result<DeliveryStream>;
}
