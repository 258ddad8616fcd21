//! Event-driven saga participant bound to one queue.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::{self, BoxFuture};
use futures_util::{FutureExt, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::broker::{Delivery, MessageBroker};
use crate::error::BoxError;
use crate::message::{Direction, SagaMessage, split_event};
use crate::redelivery::RedeliveryPolicy;
use crate::{Result, SagaError};

type StepHandler<B> = Arc<
    dyn Fn(Value, SagaChoreographer<B>) -> BoxFuture<'static, std::result::Result<(), BoxError>>
        + Send
        + Sync,
>;

struct Step<B: MessageBroker> {
    forward: StepHandler<B>,
    back: StepHandler<B>,
}

impl<B: MessageBroker> Step<B> {
    fn handler(&self, direction: Direction) -> StepHandler<B> {
        match direction {
            Direction::Forward => self.forward.clone(),
            Direction::Back => self.back.clone(),
        }
    }
}

/// Consumes one queue and dispatches each message to the forward or
/// compensating handler of a registered step.
///
/// Clones share the broker, the step table and the consumer loop. Handlers
/// receive a clone so they can publish the next step, or a compensation, to
/// other services with [`invoke_step`](Self::invoke_step).
///
/// Messages are processed one at a time. A message is acknowledged only
/// after its handler returns `Ok`; errors and panics are logged and the
/// message is nacked, subject to the [`RedeliveryPolicy`].
pub struct SagaChoreographer<B: MessageBroker> {
    broker: Arc<B>,
    queue: String,
    steps: Arc<RwLock<HashMap<String, Step<B>>>>,
    consumer: Arc<Mutex<Option<JoinHandle<()>>>>,
    policy: RedeliveryPolicy,
}

impl<B: MessageBroker> Clone for SagaChoreographer<B> {
    fn clone(&self) -> Self {
        Self {
            broker: self.broker.clone(),
            queue: self.queue.clone(),
            steps: self.steps.clone(),
            consumer: self.consumer.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<B: MessageBroker> SagaChoreographer<B> {
    /// Binds a choreographer to `queue` on an already connected broker.
    ///
    /// Nothing is declared or consumed until the first
    /// [`register_step`](Self::register_step).
    pub fn connect(broker: impl Into<Arc<B>>, queue: impl Into<String>) -> Self {
        Self {
            broker: broker.into(),
            queue: queue.into(),
            steps: Arc::new(RwLock::new(HashMap::new())),
            consumer: Arc::new(Mutex::new(None)),
            policy: RedeliveryPolicy::default(),
        }
    }

    pub fn with_redelivery_policy(mut self, policy: RedeliveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn redelivery_policy(&self) -> &RedeliveryPolicy {
        &self.policy
    }

    /// Registers the handler pair for `event` and starts consuming the
    /// queue if this is the first registration.
    ///
    /// Registering the same event again replaces its handlers. Payloads that
    /// do not decode into `P` count as handler failures.
    pub async fn register_step<P, F, FFut, G, GFut>(
        &self,
        event: &str,
        forward: F,
        back: G,
    ) -> Result<()>
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(P, Self) -> FFut + Send + Sync + 'static,
        FFut: Future<Output = std::result::Result<(), BoxError>> + Send + 'static,
        G: Fn(P, Self) -> GFut + Send + Sync + 'static,
        GFut: Future<Output = std::result::Result<(), BoxError>> + Send + 'static,
    {
        self.broker.assert_queue(&self.queue).await?;
        self.steps.write().await.insert(
            event.to_string(),
            Step {
                forward: erase(forward),
                back: erase(back),
            },
        );
        tracing::info!(event, queue = %self.queue, "saga step registered");
        self.ensure_consumer().await
    }

    /// Publishes `event` in `direction` with `payload` to `target_queue`,
    /// declaring the queue first.
    #[tracing::instrument(skip(self, direction, payload), fields(direction = %direction))]
    pub async fn invoke_step<P>(
        &self,
        target_queue: &str,
        event: &str,
        direction: Direction,
        payload: &P,
    ) -> Result<()>
    where
        P: Serialize + ?Sized,
    {
        let message = SagaMessage::new(event, direction, serde_json::to_value(payload)?);
        let body = serde_json::to_vec(&message)?;

        self.broker.assert_queue(target_queue).await?;
        self.broker.publish(target_queue, body).await?;

        metrics::counter!("saga_steps_invoked_total", "direction" => direction.as_str())
            .increment(1);
        tracing::debug!(event = %message.event, "saga step invoked");
        Ok(())
    }

    /// True while the consumer loop is running.
    pub async fn is_consuming(&self) -> bool {
        self.consumer
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the consumer loop. A message being handled is abandoned
    /// unsettled and goes back to the broker.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.consumer.lock().await.take() {
            handle.abort();
            tracing::info!(queue = %self.queue, "saga consumer shut down");
        }
    }

    async fn ensure_consumer(&self) -> Result<()> {
        let mut consumer = self.consumer.lock().await;
        if consumer.is_some() {
            return Ok(());
        }

        let mut deliveries = self.broker.consume(&self.queue).await?;
        let saga = self.clone();
        *consumer = Some(tokio::spawn(async move {
            while let Some(delivery) = deliveries.next().await {
                match delivery {
                    Ok(delivery) => saga.process(delivery).await,
                    Err(e) => {
                        tracing::error!(queue = %saga.queue, error = %e, "failed to receive saga message")
                    }
                }
            }
            tracing::info!(queue = %saga.queue, "saga message stream ended");
        }));

        tracing::info!(queue = %self.queue, "saga consumer started");
        Ok(())
    }

    #[tracing::instrument(
        skip_all,
        fields(queue = %self.queue, delivery_count = delivery.delivery_count, event = tracing::field::Empty)
    )]
    async fn process(&self, delivery: Delivery) {
        let SagaMessage { event, payload } = match serde_json::from_slice(&delivery.body) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "dropping unparseable saga message");
                settle_ack(delivery, "dropped").await;
                return;
            }
        };
        tracing::Span::current().record("event", event.as_str());

        let handler = match split_event(&event) {
            Some((name, direction)) => self
                .steps
                .read()
                .await
                .get(name)
                .map(|step| step.handler(direction)),
            None => None,
        };
        let Some(handler) = handler else {
            tracing::debug!("no step registered for event, dropping");
            settle_ack(delivery, "dropped").await;
            return;
        };

        let started = Instant::now();
        let saga = self.clone();
        let outcome = AssertUnwindSafe(async move { handler(payload, saga).await })
            .catch_unwind()
            .await;
        metrics::histogram!("saga_handler_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(panic_message(panic.as_ref())),
        };

        match failure {
            None => {
                tracing::info!("saga step handled");
                settle_ack(delivery, "acked").await;
            }
            Some(reason) if self.policy.is_exhausted(delivery.delivery_count) => {
                tracing::error!(error = %reason, "saga step failed, delivery limit reached");
                self.dead_letter(delivery).await;
            }
            Some(reason) => {
                tracing::error!(error = %reason, "saga step failed, requeueing");
                settle_nack(delivery).await;
            }
        }
    }

    async fn dead_letter(&self, delivery: Delivery) {
        let queue = self.policy.dead_letter_queue_for(&self.queue);
        let published: Result<()> = async {
            self.broker.assert_queue(&queue).await?;
            self.broker.publish(&queue, delivery.body.clone()).await
        }
        .await;

        match published {
            Ok(()) => {
                tracing::warn!(dead_letter_queue = %queue, "saga message dead-lettered");
                settle_ack(delivery, "dead_lettered").await;
            }
            Err(e) => {
                tracing::error!(dead_letter_queue = %queue, error = %e, "failed to dead-letter saga message");
                settle_nack(delivery).await;
            }
        }
    }
}

fn erase<B, P, F, Fut>(handler: F) -> StepHandler<B>
where
    B: MessageBroker,
    P: DeserializeOwned + Send + 'static,
    F: Fn(P, SagaChoreographer<B>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<(), BoxError>> + Send + 'static,
{
    Arc::new(move |payload: Value, saga: SagaChoreographer<B>| {
        match serde_json::from_value::<P>(payload) {
            Ok(payload) => handler(payload, saga).boxed(),
            Err(e) => future::ready(Err(SagaError::Serialization(e).into())).boxed(),
        }
    })
}

async fn settle_ack(delivery: Delivery, outcome: &'static str) {
    match delivery.ack().await {
        Ok(()) => metrics::counter!("saga_messages_total", "outcome" => outcome).increment(1),
        Err(e) => tracing::error!(error = %e, "failed to ack saga message"),
    }
}

async fn settle_nack(delivery: Delivery) {
    match delivery.nack().await {
        Ok(()) => metrics::counter!("saga_messages_total", "outcome" => "requeued").increment(1),
        Err(e) => tracing::error!(error = %e, "failed to nack saga message"),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    SagaError::Handler(format!("handler panicked: {detail}")).to_string()
}
