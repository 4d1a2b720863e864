//! # Queue Porter
//!
//! Cloud queue broker adapter for task-execution frameworks, backed by Azure
//! Storage Queues with an in-memory backend for testing.
//!
//! This library provides:
//! - Idempotent queue lifecycle management with optional dead-letter pairing
//! - A pull-driven consumer with prefetch-bounded local caching
//! - Exponential, jittered backoff on empty queues
//! - At-least-once outcome resolution (ack, nack, requeue)
//!
//! ## Module Organization
//!
//! - [error] - Error types for all broker and backend operations
//! - [message] - Envelopes, queue names, and lease receipts
//! - [backend] - The queue service trait
//! - [backends] - Azure Storage Queue and in-memory backends
//! - [broker] - Queue registry and message submission
//! - [consumer] - Lease management and flow control
//! - [config] - Broker configuration
//! - [backoff] - Poll delay computation

// Module declarations
pub mod backend;
pub mod backends;
pub mod backoff;
pub mod broker;
pub mod config;
pub mod consumer;
pub mod error;
pub mod message;

// Re-export commonly used types at crate root for convenience
pub use backend::QueueBackend;
pub use backends::{AzureQueueBackend, InMemoryBackend};
pub use backoff::compute_backoff;
pub use broker::Broker;
pub use config::{AzureQueueConfig, BackendConfig, BrokerConfig, InMemoryConfig, QueueCreateMode};
pub use consumer::{Consumer, MAX_PREFETCH};
pub use error::{BackendError, BrokerError, CodecError, ValidationError};
pub use message::{
    Envelope, LeaseReceipt, LeasedMessage, MessageId, QueueName, RawMessage, DEAD_LETTER_SUFFIX,
};
