//! Broker: queue lifecycle, message submission, and consumer construction.

use crate::backend::QueueBackend;
use crate::backends::{AzureQueueBackend, InMemoryBackend};
use crate::config::{BackendConfig, BrokerConfig, QueueCreateMode};
use crate::consumer::Consumer;
use crate::error::{BackendError, BrokerError};
use crate::message::{Envelope, QueueName};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;

/// Registry of declared queues and entry point for queue operations
///
/// Every operation validates its target against the declared set; declaration
/// is idempotent and, in auto-create mode, tolerant of concurrent creation by
/// other processes. One broker is built per configuration at process start
/// and shared; the declared set only grows.
pub struct Broker {
    backend: Arc<dyn QueueBackend>,
    queues: RwLock<HashSet<QueueName>>,
    dead_letter: bool,
    create_mode: QueueCreateMode,
}

impl Broker {
    /// Create new broker from configuration
    ///
    /// Constructs the backend named by `config.backend`; fails when the
    /// backend itself cannot be built (bad credentials and the like).
    pub fn new(config: BrokerConfig) -> Result<Self, BrokerError> {
        let backend: Arc<dyn QueueBackend> = match config.backend {
            BackendConfig::Azure(azure_config) => Arc::new(AzureQueueBackend::new(azure_config)?),
            BackendConfig::InMemory(memory_config) => {
                Arc::new(InMemoryBackend::new(memory_config))
            }
        };

        Ok(Self::with_backend(
            backend,
            config.dead_letter,
            config.create_mode,
        ))
    }

    /// Create broker over a pre-built backend
    pub fn with_backend(
        backend: Arc<dyn QueueBackend>,
        dead_letter: bool,
        create_mode: QueueCreateMode,
    ) -> Self {
        Self {
            backend,
            queues: RwLock::new(HashSet::new()),
            dead_letter,
            create_mode,
        }
    }

    /// Declare a queue, creating backend resources on first declaration
    ///
    /// Redeclaring a known name returns immediately. In auto-create mode a
    /// concurrent creation by another process is not an error; in
    /// require-existing mode a missing backend queue is fatal.
    pub async fn declare_queue(&self, queue_name: &QueueName) -> Result<(), BrokerError> {
        {
            let queues = self.queues.read().await;
            if queues.contains(queue_name) {
                return Ok(());
            }
        }

        debug!(queue = %queue_name, "declaring queue");

        match self.create_mode {
            QueueCreateMode::CreateIfMissing => {
                self.create_tolerant(queue_name).await?;
                if self.dead_letter {
                    let dead_letter_queue = queue_name.dead_letter()?;
                    self.create_tolerant(&dead_letter_queue).await?;
                }
            }
            QueueCreateMode::RequireExisting => {
                self.require_existing(queue_name).await?;
                if self.dead_letter {
                    let dead_letter_queue = queue_name.dead_letter()?;
                    self.require_existing(&dead_letter_queue).await?;
                }
            }
        }

        let mut queues = self.queues.write().await;
        queues.insert(queue_name.clone());
        Ok(())
    }

    /// Create a backend queue, treating a concurrent creation as success
    async fn create_tolerant(&self, queue_name: &QueueName) -> Result<(), BrokerError> {
        match self.backend.create_queue(queue_name).await {
            Ok(()) => Ok(()),
            Err(BackendError::AlreadyExists { .. }) => {
                debug!(queue = %queue_name, "queue already exists, treating as declared");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Verify a backend queue is already provisioned
    async fn require_existing(&self, queue_name: &QueueName) -> Result<(), BrokerError> {
        if self.backend.queue_exists(queue_name).await? {
            Ok(())
        } else {
            Err(BrokerError::QueueMissing {
                queue_name: queue_name.to_string(),
            })
        }
    }

    /// Submit an envelope to its target queue, optionally delayed
    ///
    /// `delay` is floored to whole seconds for the backend's
    /// initial-invisibility parameter. Payload-size and delay-window limits
    /// are enforced by the backend; violations surface unmodified.
    pub async fn enqueue(
        &self,
        envelope: Envelope,
        delay: Option<Duration>,
    ) -> Result<Envelope, BrokerError> {
        self.validate_declared(&envelope.queue_name).await?;

        let initial_invisibility = delay
            .map(|d| Duration::from_secs(d.as_secs()))
            .unwrap_or(Duration::ZERO);

        debug!(
            message_id = %envelope.message_id,
            queue = %envelope.queue_name,
            delay_secs = initial_invisibility.as_secs(),
            "enqueueing message"
        );

        let payload = envelope.encode()?;
        self.backend
            .send(&envelope.queue_name, &payload, initial_invisibility)
            .await?;

        Ok(envelope)
    }

    /// Build a consumer bound to a declared queue
    pub async fn consume(
        &self,
        queue_name: &QueueName,
        prefetch: u32,
        timeout: Duration,
    ) -> Result<Consumer, BrokerError> {
        self.validate_declared(queue_name).await?;

        let dead_letter_queue = if self.dead_letter {
            Some(queue_name.dead_letter()?)
        } else {
            None
        };

        Ok(Consumer::new(
            Arc::clone(&self.backend),
            queue_name.clone(),
            dead_letter_queue,
            prefetch,
            timeout,
        ))
    }

    /// Remove all messages, visible and leased, from a declared queue
    pub async fn flush(&self, queue_name: &QueueName) -> Result<(), BrokerError> {
        self.validate_declared(queue_name).await?;
        self.backend.clear(queue_name).await?;
        Ok(())
    }

    /// Flush every declared queue
    pub async fn flush_all(&self) -> Result<(), BrokerError> {
        let queues = self.get_declared_queues().await;
        for queue_name in queues {
            self.flush(&queue_name).await?;
        }
        Ok(())
    }

    /// Snapshot of the declared queue names
    pub async fn get_declared_queues(&self) -> HashSet<QueueName> {
        self.queues.read().await.clone()
    }

    /// Whether declared queues get a paired dead-letter queue
    pub fn dead_letter_enabled(&self) -> bool {
        self.dead_letter
    }

    async fn validate_declared(&self, queue_name: &QueueName) -> Result<(), BrokerError> {
        let queues = self.queues.read().await;
        if queues.contains(queue_name) {
            Ok(())
        } else {
            Err(BrokerError::QueueNotFound {
                queue_name: queue_name.to_string(),
            })
        }
    }
}
