//! Common test utilities for queue-porter integration tests.

use bytes::Bytes;
use queue_porter::{
    BackendConfig, Broker, BrokerConfig, Envelope, InMemoryConfig, QueueCreateMode, QueueName,
};
use std::time::Duration;

/// Backoff ceiling used by test consumers; short enough to keep empty-queue
/// polls fast, long enough that lease visibility (whole seconds) stays sane.
pub const TEST_TIMEOUT: Duration = Duration::from_millis(400);

pub fn queue(name: &str) -> QueueName {
    QueueName::new(name.to_string()).expect("valid test queue name")
}

/// Broker over a fresh in-memory backend
pub fn memory_broker(dead_letter: bool) -> Broker {
    Broker::new(BrokerConfig {
        backend: BackendConfig::InMemory(InMemoryConfig::default()),
        dead_letter,
        create_mode: QueueCreateMode::CreateIfMissing,
    })
    .expect("in-memory broker construction cannot fail")
}

/// Broker with `name` already declared
pub async fn declared_broker(name: &QueueName, dead_letter: bool) -> Broker {
    let broker = memory_broker(dead_letter);
    broker.declare_queue(name).await.expect("declare test queue");
    broker
}

pub fn envelope(queue: &QueueName, body: &[u8]) -> Envelope {
    Envelope::new(queue.clone(), Bytes::copy_from_slice(body))
}
