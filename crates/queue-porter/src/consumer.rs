//! Pull-driven consumer with prefetch-bounded fetching and empty-queue backoff.

use crate::backend::QueueBackend;
use crate::backoff::compute_backoff;
use crate::error::BrokerError;
use crate::message::{LeasedMessage, MessageId, QueueName};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;

/// The hard ceiling on messages a consumer may hold unresolved.
pub const MAX_PREFETCH: u32 = 32;

/// A pull-driven reader over one queue
///
/// Produces a lazy sequence of [`LeasedMessage`]s via [`next`](Self::next),
/// holding at most `prefetch` messages (cached plus claimed) at a time, and
/// resolves outcomes via [`ack`](Self::ack), [`nack`](Self::nack), and
/// [`requeue`](Self::requeue).
///
/// A consumer owns its cache and claimed set outright; the `&mut self`
/// receivers make the required serialized access a compile-time property.
/// Independent consumers on the same queue coordinate purely through the
/// backend's per-message leases.
pub struct Consumer {
    backend: Arc<dyn QueueBackend>,
    queue_name: QueueName,
    dead_letter_queue: Option<QueueName>,
    prefetch: u32,
    timeout: Duration,
    visibility: Duration,
    cache: VecDeque<LeasedMessage>,
    claimed: HashSet<MessageId>,
    misses: u32,
}

impl Consumer {
    /// Create new consumer bound to one queue
    ///
    /// `prefetch` is clamped to [`MAX_PREFETCH`]. `timeout` caps the
    /// empty-queue backoff and, floored to whole seconds, sets the lease
    /// visibility window for fetched messages.
    pub(crate) fn new(
        backend: Arc<dyn QueueBackend>,
        queue_name: QueueName,
        dead_letter_queue: Option<QueueName>,
        prefetch: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            queue_name,
            dead_letter_queue,
            prefetch: prefetch.min(MAX_PREFETCH),
            timeout,
            visibility: Duration::from_secs(timeout.as_secs()),
            cache: VecDeque::new(),
            claimed: HashSet::new(),
            misses: 0,
        }
    }

    /// Messages currently held unresolved: claimed by the caller plus cached
    pub fn outstanding(&self) -> u32 {
        (self.claimed.len() + self.cache.len()) as u32
    }

    /// Pull the next message, or `None` when the queue is currently empty
    ///
    /// Serves from the local cache first; an empty cache triggers a single
    /// bounded batch fetch for the remaining prefetch capacity. When neither
    /// yields a message (empty queue, or every slot already claimed) this
    /// sleeps for an exponentially growing, jittered delay capped at the
    /// configured timeout and returns `Ok(None)`; an empty queue is never an
    /// error.
    pub async fn next(&mut self) -> Result<Option<LeasedMessage>, BrokerError> {
        loop {
            if let Some(message) = self.cache.pop_front() {
                self.misses = 0;
                self.claimed.insert(message.message_id().clone());
                return Ok(Some(message));
            }

            let mut fetched = false;
            if self.outstanding() < self.prefetch {
                let fillout = self.prefetch - self.outstanding();
                let batch = self
                    .backend
                    .receive_batch(&self.queue_name, fillout, self.visibility)
                    .await?;

                trace!(
                    queue = %self.queue_name,
                    requested = fillout,
                    received = batch.len(),
                    "fetched message batch"
                );

                fetched = !batch.is_empty();
                self.cache = batch
                    .into_iter()
                    .map(LeasedMessage::from_raw)
                    .collect::<Result<VecDeque<_>, _>>()?;
            }

            if !fetched {
                let (misses, delay) = compute_backoff(self.misses, self.timeout);
                self.misses = misses;
                debug!(
                    queue = %self.queue_name,
                    misses = self.misses,
                    delay_ms = delay.as_millis() as u64,
                    "queue empty, backing off"
                );
                tokio::time::sleep(delay).await;
                return Ok(None);
            }
        }
    }

    /// Acknowledge a message: delete its lease permanently
    ///
    /// The claimed-set removal is best-effort local cleanup and happens even
    /// when the backend delete fails; the backend stays the source of truth
    /// for whether the message is truly gone. Resolving a message that is not
    /// claimed is a no-op on the bookkeeping side.
    pub async fn ack(&mut self, message: &LeasedMessage) -> Result<(), BrokerError> {
        let result = self
            .backend
            .delete(&self.queue_name, message.receipt())
            .await;
        self.claimed.remove(message.message_id());
        result.map_err(Into::into)
    }

    /// Reject a message: forward it to the dead-letter queue, then delete
    ///
    /// The original encoded bytes are forwarded unmodified. With dead-letter
    /// mode disabled this degrades to [`ack`](Self::ack): the message is
    /// dropped, and any retry policy is the caller's responsibility.
    pub async fn nack(&mut self, message: &LeasedMessage) -> Result<(), BrokerError> {
        if let Some(ref dead_letter_queue) = self.dead_letter_queue {
            self.backend
                .send(dead_letter_queue, message.encoded(), Duration::ZERO)
                .await?;
            debug!(
                queue = %self.queue_name,
                dead_letter_queue = %dead_letter_queue,
                message_id = %message.message_id(),
                "message forwarded to dead-letter queue"
            );
        } else {
            warn!(
                queue = %self.queue_name,
                message_id = %message.message_id(),
                "dead-letter mode disabled, dropping nacked message"
            );
        }

        let result = self
            .backend
            .delete(&self.queue_name, message.receipt())
            .await;
        self.claimed.remove(message.message_id());
        result.map_err(Into::into)
    }

    /// Return messages to the queue as brand-new submissions
    ///
    /// Each message is re-sent and then its old lease deleted, independently
    /// and without batching. A crash between the two steps leaves zero or two
    /// copies in flight; requeue is at-least-once and handlers must be
    /// idempotent.
    pub async fn requeue<I>(&mut self, messages: I) -> Result<(), BrokerError>
    where
        I: IntoIterator<Item = LeasedMessage>,
    {
        for message in messages {
            self.backend
                .send(&self.queue_name, message.encoded(), Duration::ZERO)
                .await?;
            let result = self
                .backend
                .delete(&self.queue_name, message.receipt())
                .await;
            self.claimed.remove(message.message_id());
            result?;
        }
        Ok(())
    }

    /// Queue this consumer reads from
    pub fn queue_name(&self) -> &QueueName {
        &self.queue_name
    }

    /// Effective prefetch ceiling after clamping
    pub fn prefetch(&self) -> u32 {
        self.prefetch
    }

    /// Consecutive empty fetches since the last successful pull
    pub fn misses(&self) -> u32 {
        self.misses
    }

    #[cfg(test)]
    pub(crate) fn claimed(&self) -> &HashSet<MessageId> {
        &self.claimed
    }

    #[cfg(test)]
    pub(crate) fn cached(&self) -> usize {
        self.cache.len()
    }
}
