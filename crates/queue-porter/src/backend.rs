//! Backend trait abstracting the cloud queue service.

use crate::error::BackendError;
use crate::message::{LeaseReceipt, QueueName, RawMessage};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Interface implemented by queue service backends (Azure, in-memory)
///
/// The contract mirrors a lease-by-visibility-timeout queue service: receive
/// hides a message for the visibility window, delete resolves it permanently,
/// and an unresolved lease reappears on its own. Backends are stateless per
/// call and shared via `Arc` across broker and consumers.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Create a queue; a queue that already exists is `AlreadyExists`
    async fn create_queue(&self, queue: &QueueName) -> Result<(), BackendError>;

    /// Delete a queue and all of its messages
    async fn delete_queue(&self, queue: &QueueName) -> Result<(), BackendError>;

    /// Probe whether a queue exists on the service
    async fn queue_exists(&self, queue: &QueueName) -> Result<bool, BackendError>;

    /// Submit a payload, invisible for `initial_invisibility` after arrival
    ///
    /// The service enforces its payload-size ceiling and maximum delay
    /// window; violations surface as errors, never silent truncation.
    async fn send(
        &self,
        queue: &QueueName,
        payload: &Bytes,
        initial_invisibility: Duration,
    ) -> Result<(), BackendError>;

    /// Fetch up to `max_items` visible messages, leasing each for `visibility`
    async fn receive_batch(
        &self,
        queue: &QueueName,
        max_items: u32,
        visibility: Duration,
    ) -> Result<Vec<RawMessage>, BackendError>;

    /// Permanently delete a leased message
    async fn delete(&self, queue: &QueueName, receipt: &LeaseReceipt) -> Result<(), BackendError>;

    /// Remove all messages from a queue, leased or visible
    async fn clear(&self, queue: &QueueName) -> Result<(), BackendError>;
}
