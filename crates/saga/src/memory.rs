use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream;
use tokio::sync::{Mutex, Notify};

use crate::broker::{Acker, Delivery, DeliveryStream, MessageBroker};
use crate::{Result, SagaError};

#[derive(Clone)]
struct Envelope {
    body: Vec<u8>,
    deliveries: u64,
}

#[derive(Default)]
struct Queue {
    ready: VecDeque<Envelope>,
    unacked: usize,
    acked: usize,
    published: Vec<Vec<u8>>,
    notify: Arc<Notify>,
}

/// In-memory broker for testing and single-process runs.
///
/// Clones share the same queues. A nacked message, or one whose delivery is
/// dropped unsettled, goes back to the head of its queue with its delivery
/// count kept.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    queues: Arc<Mutex<HashMap<String, Queue>>>,
}

impl InMemoryBroker {
    /// Creates a new broker with no queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all declared queues, sorted.
    pub async fn queues(&self) -> Vec<String> {
        let mut names: Vec<_> = self.queues.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Messages waiting to be delivered.
    pub async fn pending(&self, queue: &str) -> usize {
        self.with_queue(queue, |q| q.ready.len()).await
    }

    /// Messages delivered but not yet settled.
    pub async fn unacked(&self, queue: &str) -> usize {
        self.with_queue(queue, |q| q.unacked).await
    }

    /// Messages acknowledged so far.
    pub async fn acked(&self, queue: &str) -> usize {
        self.with_queue(queue, |q| q.acked).await
    }

    /// Every body ever published to `queue`, in publish order.
    pub async fn published(&self, queue: &str) -> Vec<Vec<u8>> {
        self.with_queue(queue, |q| q.published.clone()).await
    }

    async fn with_queue<T: Default>(&self, queue: &str, f: impl FnOnce(&Queue) -> T) -> T {
        self.queues.lock().await.get(queue).map(f).unwrap_or_default()
    }

    async fn next_delivery(&self, queue: &str) -> Result<Delivery> {
        loop {
            let notify = {
                let mut queues = self.queues.lock().await;
                let state = queues
                    .get_mut(queue)
                    .ok_or_else(|| not_declared(queue))?;

                if let Some(mut envelope) = state.ready.pop_front() {
                    envelope.deliveries += 1;
                    state.unacked += 1;
                    return Ok(Delivery::new(
                        envelope.body.clone(),
                        envelope.deliveries,
                        Box::new(InMemoryAcker {
                            broker: self.clone(),
                            queue: queue.to_string(),
                            envelope: Some(envelope),
                        }),
                    ));
                }
                state.notify.clone()
            };
            notify.notified().await;
        }
    }
}

fn not_declared(queue: &str) -> SagaError {
    SagaError::Broker(format!("queue '{queue}' has not been declared"))
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn assert_queue(&self, queue: &str) -> Result<()> {
        self.queues
            .lock()
            .await
            .entry(queue.to_string())
            .or_default();
        Ok(())
    }

    async fn publish(&self, queue: &str, body: Vec<u8>) -> Result<()> {
        let mut queues = self.queues.lock().await;
        let state = queues
            .get_mut(queue)
            .ok_or_else(|| not_declared(queue))?;
        state.published.push(body.clone());
        state.ready.push_back(Envelope {
            body,
            deliveries: 0,
        });
        state.notify.notify_one();
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream> {
        if !self.queues.lock().await.contains_key(queue) {
            return Err(not_declared(queue));
        }

        let deliveries = stream::unfold(
            (self.clone(), queue.to_string()),
            |(broker, queue)| async move {
                let delivery = broker.next_delivery(&queue).await;
                Some((delivery, (broker, queue)))
            },
        );
        Ok(Box::pin(deliveries))
    }
}

struct InMemoryAcker {
    broker: InMemoryBroker,
    queue: String,
    /// Taken once the delivery is settled.
    envelope: Option<Envelope>,
}

fn requeue(state: &mut Queue, envelope: Envelope) {
    state.unacked -= 1;
    state.ready.push_front(envelope);
    state.notify.notify_one();
}

#[async_trait]
impl Acker for InMemoryAcker {
    async fn ack(self: Box<Self>) -> Result<()> {
        let mut acker = self;
        acker.envelope.take();
        let mut queues = acker.broker.queues.lock().await;
        let state = queues
            .get_mut(&acker.queue)
            .ok_or_else(|| not_declared(&acker.queue))?;
        state.unacked -= 1;
        state.acked += 1;
        Ok(())
    }

    async fn nack(self: Box<Self>) -> Result<()> {
        let mut acker = self;
        let envelope = acker.envelope.take();
        let mut queues = acker.broker.queues.lock().await;
        let state = queues
            .get_mut(&acker.queue)
            .ok_or_else(|| not_declared(&acker.queue))?;
        if let Some(envelope) = envelope {
            requeue(state, envelope);
        }
        Ok(())
    }
}

/// An unsettled delivery goes back to the head of its queue, as a broker
/// requeues on channel close.
impl Drop for InMemoryAcker {
    fn drop(&mut self) {
        let Some(envelope) = self.envelope.take() else {
            return;
        };

        if let Ok(mut queues) = self.broker.queues.try_lock() {
            if let Some(state) = queues.get_mut(&self.queue) {
                requeue(state, envelope);
            }
            return;
        }

        let broker = self.broker.clone();
        let queue = self.queue.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Some(state) = broker.queues.lock().await.get_mut(&queue) {
                        requeue(state, envelope);
                    }
                });
            }
            Err(_) => {
                tracing::warn!(%queue, "unsettled delivery dropped outside a runtime");
            }
        }
    }
}
