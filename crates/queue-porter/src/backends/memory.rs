//! In-memory queue backend for testing and development.
//!
//! Simulates the lease-by-visibility-timeout contract of the cloud service:
//! received messages stay in place but become invisible until their lease
//! elapses, deletes require the current pop receipt, and the service-side
//! payload and delay limits are enforced so tests exercise the same failure
//! surface as production.

use crate::backend::QueueBackend;
use crate::config::InMemoryConfig;
use crate::error::BackendError;
use crate::message::{LeaseReceipt, QueueName, RawMessage};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// A message stored in a queue with lease bookkeeping
#[derive(Clone)]
struct StoredMessage {
    backend_id: String,
    payload: Bytes,
    visible_at: DateTime<Utc>,
    pop_receipt: Option<String>,
}

impl StoredMessage {
    fn new(payload: Bytes, visible_at: DateTime<Utc>) -> Self {
        Self {
            backend_id: uuid::Uuid::new_v4().to_string(),
            payload,
            visible_at,
            pop_receipt: None,
        }
    }

    fn is_visible(&self, now: DateTime<Utc>) -> bool {
        now >= self.visible_at
    }
}

/// Storage for all queues of one backend instance
struct QueueStorage {
    queues: HashMap<QueueName, VecDeque<StoredMessage>>,
}

impl QueueStorage {
    fn new() -> Self {
        Self {
            queues: HashMap::new(),
        }
    }

    fn queue_mut(
        &mut self,
        queue: &QueueName,
    ) -> Result<&mut VecDeque<StoredMessage>, BackendError> {
        self.queues
            .get_mut(queue)
            .ok_or_else(|| BackendError::NotFound {
                queue_name: queue.to_string(),
            })
    }
}

/// In-memory queue backend
pub struct InMemoryBackend {
    storage: Arc<RwLock<QueueStorage>>,
    config: InMemoryConfig,
}

impl InMemoryBackend {
    /// Create new in-memory backend with configuration
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            storage: Arc::new(RwLock::new(QueueStorage::new())),
            config,
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

#[async_trait]
impl QueueBackend for InMemoryBackend {
    async fn create_queue(&self, queue: &QueueName) -> Result<(), BackendError> {
        let mut storage = self.storage.write().expect("queue storage lock poisoned");
        if storage.queues.contains_key(queue) {
            return Err(BackendError::AlreadyExists {
                queue_name: queue.to_string(),
            });
        }
        storage.queues.insert(queue.clone(), VecDeque::new());
        Ok(())
    }

    async fn delete_queue(&self, queue: &QueueName) -> Result<(), BackendError> {
        let mut storage = self.storage.write().expect("queue storage lock poisoned");
        storage
            .queues
            .remove(queue)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound {
                queue_name: queue.to_string(),
            })
    }

    async fn queue_exists(&self, queue: &QueueName) -> Result<bool, BackendError> {
        let storage = self.storage.read().expect("queue storage lock poisoned");
        Ok(storage.queues.contains_key(queue))
    }

    async fn send(
        &self,
        queue: &QueueName,
        payload: &Bytes,
        initial_invisibility: Duration,
    ) -> Result<(), BackendError> {
        if payload.len() > self.config.max_message_bytes {
            return Err(BackendError::MessageTooLarge {
                size: payload.len(),
                max_size: self.config.max_message_bytes,
            });
        }
        if initial_invisibility > self.config.max_delay {
            return Err(BackendError::DelayTooLong {
                requested: initial_invisibility,
                max: self.config.max_delay,
            });
        }

        let visible_at = Utc::now()
            + chrono::Duration::from_std(initial_invisibility).map_err(|_| {
                BackendError::DelayTooLong {
                    requested: initial_invisibility,
                    max: self.config.max_delay,
                }
            })?;

        let mut storage = self.storage.write().expect("queue storage lock poisoned");
        let messages = storage.queue_mut(queue)?;
        messages.push_back(StoredMessage::new(payload.clone(), visible_at));
        Ok(())
    }

    async fn receive_batch(
        &self,
        queue: &QueueName,
        max_items: u32,
        visibility: Duration,
    ) -> Result<Vec<RawMessage>, BackendError> {
        let limit = max_items.min(self.config.page_limit) as usize;
        let now = Utc::now();
        let lease_until = now
            + chrono::Duration::from_std(visibility)
                .unwrap_or_else(|_| chrono::Duration::seconds(30));

        let mut storage = self.storage.write().expect("queue storage lock poisoned");
        let messages = storage.queue_mut(queue)?;

        let mut batch = Vec::new();
        for stored in messages.iter_mut() {
            if batch.len() >= limit {
                break;
            }
            if !stored.is_visible(now) {
                continue;
            }

            let pop_receipt = uuid::Uuid::new_v4().to_string();
            stored.visible_at = lease_until;
            stored.pop_receipt = Some(pop_receipt.clone());

            batch.push(RawMessage {
                receipt: LeaseReceipt::new(stored.backend_id.clone(), pop_receipt),
                payload: stored.payload.clone(),
            });
        }

        Ok(batch)
    }

    async fn delete(&self, queue: &QueueName, receipt: &LeaseReceipt) -> Result<(), BackendError> {
        let mut storage = self.storage.write().expect("queue storage lock poisoned");
        let messages = storage.queue_mut(queue)?;

        let position = messages.iter().position(|stored| {
            stored.backend_id == receipt.message_id()
                && stored.pop_receipt.as_deref() == Some(receipt.pop_receipt())
        });

        match position {
            Some(index) => {
                messages.remove(index);
                Ok(())
            }
            None => Err(BackendError::ReceiptNotFound {
                receipt: receipt.pop_receipt().to_string(),
            }),
        }
    }

    async fn clear(&self, queue: &QueueName) -> Result<(), BackendError> {
        let mut storage = self.storage.write().expect("queue storage lock poisoned");
        let messages = storage.queue_mut(queue)?;
        messages.clear();
        Ok(())
    }
}
