//! NATS JetStream broker.
//!
//! Each queue maps to a work-queue stream whose only subject is the queue
//! name, consumed through one durable pull consumer with explicit acks.
//! Every consumer of the same queue shares that durable, so a message is
//! handed to one of them at a time.

use async_nats::jetstream::{self, AckKind};
use async_nats::jetstream::consumer::{AckPolicy, pull};
use async_nats::jetstream::stream::{self as js_stream, RetentionPolicy};
use async_trait::async_trait;
use futures_util::StreamExt;

use crate::broker::{Acker, Delivery, DeliveryStream, MessageBroker};
use crate::{Result, SagaError};

#[derive(Clone)]
pub struct JetStreamBroker {
    context: jetstream::Context,
}

impl JetStreamBroker {
    /// Connects to the NATS server at `address`, e.g. `nats://localhost:4222`.
    pub async fn connect(address: &str) -> Result<Self> {
        let client = async_nats::connect(address)
            .await
            .map_err(SagaError::broker)?;
        tracing::info!(address, "connected to NATS");
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: async_nats::Client) -> Self {
        Self {
            context: jetstream::new(client),
        }
    }

    async fn stream(&self, queue: &str) -> Result<js_stream::Stream> {
        let stream = self
            .context
            .get_or_create_stream(js_stream::Config {
                name: stream_name(queue),
                subjects: vec![queue.to_string()],
                retention: RetentionPolicy::WorkQueue,
                ..Default::default()
            })
            .await
            .map_err(SagaError::broker)?;

        let subjects = &stream.cached_info().config.subjects;
        if !subjects.iter().any(|subject| subject == queue) {
            return Err(SagaError::Broker(format!(
                "stream '{}' does not carry queue '{queue}' (subjects: {subjects:?})",
                stream_name(queue)
            )));
        }
        Ok(stream)
    }
}

/// Stream and consumer names may not contain subject tokens or separators.
///
/// ASCII letters, digits and `-` are kept; every other byte, `_` included,
/// becomes `_` plus two hex digits, so distinct queues never share a stream.
fn stream_name(queue: &str) -> String {
    let mut name = String::with_capacity(queue.len());
    for byte in queue.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            name.push(char::from(byte));
        } else {
            name.push_str(&format!("_{byte:02X}"));
        }
    }
    name
}

#[async_trait]
impl MessageBroker for JetStreamBroker {
    async fn assert_queue(&self, queue: &str) -> Result<()> {
        self.stream(queue).await.map(|_| ())
    }

    async fn publish(&self, queue: &str, body: Vec<u8>) -> Result<()> {
        self.context
            .publish(queue.to_string(), body.into())
            .await
            .map_err(SagaError::broker)?
            .await
            .map_err(SagaError::broker)?;
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream> {
        let durable = stream_name(queue);
        let consumer = self
            .stream(queue)
            .await?
            .get_or_create_consumer(
                &durable,
                pull::Config {
                    durable_name: Some(durable.clone()),
                    ack_policy: AckPolicy::Explicit,
                    ..Default::default()
                },
            )
            .await
            .map_err(SagaError::broker)?;

        let messages = consumer.messages().await.map_err(SagaError::broker)?;
        let deliveries = messages.map(|message| {
            let message = message.map_err(SagaError::broker)?;
            let delivery_count = message
                .info()
                .map(|info| info.delivered.max(1) as u64)
                .unwrap_or(1);
            Ok(Delivery::new(
                message.payload.to_vec(),
                delivery_count,
                Box::new(JetStreamAcker(message)),
            ))
        });
        Ok(Box::pin(deliveries))
    }
}

struct JetStreamAcker(jetstream::Message);

#[async_trait]
impl Acker for JetStreamAcker {
    async fn ack(self: Box<Self>) -> Result<()> {
        self.0.ack().await.map_err(SagaError::broker)
    }

    async fn nack(self: Box<Self>) -> Result<()> {
        self.0
            .ack_with(AckKind::Nak(None))
            .await
            .map_err(SagaError::broker)
    }
}
