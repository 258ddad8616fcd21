/// Default number of deliveries before a failing message is dead-lettered.
pub const DEFAULT_MAX_DELIVERIES: u64 = 5;

/// Suffix of the default dead-letter queue, appended to the source queue.
pub const DEAD_LETTER_SUFFIX: &str = ".dead";

/// What happens to a message whose handler keeps failing.
///
/// Below the limit a failed message is nacked and redelivered. Once a
/// delivery that reached the limit fails, the message is published to the
/// dead-letter queue and acknowledged on its source queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeliveryPolicy {
    /// `None` redelivers forever.
    pub max_deliveries: Option<u64>,
    /// `None` means `<queue>.dead`.
    pub dead_letter_queue: Option<String>,
}

impl Default for RedeliveryPolicy {
    fn default() -> Self {
        Self {
            max_deliveries: Some(DEFAULT_MAX_DELIVERIES),
            dead_letter_queue: None,
        }
    }
}

impl RedeliveryPolicy {
    /// Never gives up on a message.
    pub fn unbounded() -> Self {
        Self {
            max_deliveries: None,
            dead_letter_queue: None,
        }
    }

    /// Gives up after `max` deliveries (at least one).
    pub fn limited(max: u64) -> Self {
        Self {
            max_deliveries: Some(max.max(1)),
            dead_letter_queue: None,
        }
    }

    pub fn with_dead_letter_queue(mut self, queue: impl Into<String>) -> Self {
        self.dead_letter_queue = Some(queue.into());
        self
    }

    /// True if a failed delivery with this count should not be retried.
    pub fn is_exhausted(&self, delivery_count: u64) -> bool {
        self.max_deliveries
            .is_some_and(|max| delivery_count >= max)
    }

    /// The dead-letter queue for messages from `queue`.
    pub fn dead_letter_queue_for(&self, queue: &str) -> String {
        self.dead_letter_queue
            .clone()
            .unwrap_or_else(|| format!("{queue}{DEAD_LETTER_SUFFIX}"))
    }
}
