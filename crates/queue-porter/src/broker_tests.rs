//! Tests for broker lifecycle and submission guards.

use super::*;
use crate::error::BackendError;
use bytes::Bytes;

fn queue() -> QueueName {
    QueueName::new("tasks".to_string()).unwrap()
}

fn memory_broker(dead_letter: bool) -> Broker {
    let backend = Arc::new(InMemoryBackend::default());
    Broker::with_backend(backend, dead_letter, QueueCreateMode::CreateIfMissing)
}

fn envelope(body: &[u8]) -> Envelope {
    Envelope::new(queue(), Bytes::copy_from_slice(body))
}

#[tokio::test]
async fn test_declare_queue_is_idempotent() {
    let broker = memory_broker(false);

    for _ in 0..4 {
        broker.declare_queue(&queue()).await.unwrap();
    }

    let declared = broker.get_declared_queues().await;
    assert_eq!(declared.len(), 1);
    assert!(declared.contains(&queue()));
}

#[tokio::test]
async fn test_declare_queue_tolerates_existing_backend_queue() {
    let backend = Arc::new(InMemoryBackend::default());
    // Another process already created the queue
    backend.create_queue(&queue()).await.unwrap();

    let broker = Broker::with_backend(backend, false, QueueCreateMode::CreateIfMissing);
    broker.declare_queue(&queue()).await.unwrap();

    assert!(broker.get_declared_queues().await.contains(&queue()));
}

#[tokio::test]
async fn test_declare_queue_creates_dead_letter_partner() {
    let backend = Arc::new(InMemoryBackend::default());
    let broker = Broker::with_backend(backend.clone(), true, QueueCreateMode::CreateIfMissing);

    broker.declare_queue(&queue()).await.unwrap();

    assert!(backend.queue_exists(&queue()).await.unwrap());
    assert!(backend
        .queue_exists(&queue().dead_letter().unwrap())
        .await
        .unwrap());

    // The dead-letter partner is backend plumbing, not a declared queue
    assert_eq!(broker.get_declared_queues().await.len(), 1);
}

#[tokio::test]
async fn test_require_existing_mode_rejects_missing_queue() {
    let backend = Arc::new(InMemoryBackend::default());
    let broker = Broker::with_backend(backend, false, QueueCreateMode::RequireExisting);

    let result = broker.declare_queue(&queue()).await;
    assert!(matches!(result, Err(BrokerError::QueueMissing { .. })));
    assert!(broker.get_declared_queues().await.is_empty());
}

#[tokio::test]
async fn test_require_existing_mode_accepts_provisioned_queue() {
    let backend = Arc::new(InMemoryBackend::default());
    backend.create_queue(&queue()).await.unwrap();

    let broker = Broker::with_backend(backend, false, QueueCreateMode::RequireExisting);
    broker.declare_queue(&queue()).await.unwrap();

    assert!(broker.get_declared_queues().await.contains(&queue()));
}

#[tokio::test]
async fn test_enqueue_requires_declared_queue() {
    let broker = memory_broker(false);

    let result = broker.enqueue(envelope(b"work"), None).await;
    assert!(matches!(result, Err(BrokerError::QueueNotFound { .. })));
}

#[tokio::test]
async fn test_consume_requires_declared_queue() {
    let broker = memory_broker(false);

    let result = broker
        .consume(&queue(), 1, Duration::from_millis(200))
        .await;
    assert!(matches!(result, Err(BrokerError::QueueNotFound { .. })));
}

#[tokio::test]
async fn test_flush_requires_declared_queue() {
    let broker = memory_broker(false);

    let result = broker.flush(&queue()).await;
    assert!(matches!(result, Err(BrokerError::QueueNotFound { .. })));
}

#[tokio::test]
async fn test_enqueue_returns_envelope_on_success() {
    let broker = memory_broker(false);
    broker.declare_queue(&queue()).await.unwrap();

    let sent = envelope(b"work");
    let returned = broker.enqueue(sent.clone(), None).await.unwrap();
    assert_eq!(returned, sent);
}

#[tokio::test]
async fn test_enqueue_surfaces_backend_limit_errors() {
    let broker = memory_broker(false);
    broker.declare_queue(&queue()).await.unwrap();

    // Payload over the 64 KiB service ceiling
    let oversized = envelope(&vec![0u8; 64 * 1024]);
    let result = broker.enqueue(oversized, None).await;
    assert!(matches!(
        result,
        Err(BrokerError::Backend(BackendError::MessageTooLarge { .. }))
    ));

    // Delay past the 7-day service maximum
    let eight_days = Duration::from_secs(8 * 24 * 60 * 60);
    let result = broker.enqueue(envelope(b"work"), Some(eight_days)).await;
    assert!(matches!(
        result,
        Err(BrokerError::Backend(BackendError::DelayTooLong { .. }))
    ));
}

#[tokio::test]
async fn test_flush_empties_queue() {
    let broker = memory_broker(false);
    broker.declare_queue(&queue()).await.unwrap();

    for _ in 0..5 {
        broker.enqueue(envelope(b"work"), None).await.unwrap();
    }
    broker.flush(&queue()).await.unwrap();

    let mut consumer = broker
        .consume(&queue(), 8, Duration::from_millis(200))
        .await
        .unwrap();
    assert!(consumer.next().await.unwrap().is_none());
}

#[tokio::test]
async fn test_flush_all_covers_every_declared_queue() {
    let broker = memory_broker(false);
    let other = QueueName::new("reports".to_string()).unwrap();
    broker.declare_queue(&queue()).await.unwrap();
    broker.declare_queue(&other).await.unwrap();

    broker.enqueue(envelope(b"work"), None).await.unwrap();
    broker
        .enqueue(
            Envelope::new(other.clone(), Bytes::from_static(b"report")),
            None,
        )
        .await
        .unwrap();

    broker.flush_all().await.unwrap();

    for name in [&queue(), &other] {
        let mut consumer = broker
            .consume(name, 1, Duration::from_millis(200))
            .await
            .unwrap();
        assert!(consumer.next().await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_consume_passes_dead_letter_queue_to_consumer() {
    let broker = memory_broker(true);
    broker.declare_queue(&queue()).await.unwrap();

    let consumer = broker
        .consume(&queue(), 4, Duration::from_millis(200))
        .await
        .unwrap();
    assert_eq!(consumer.queue_name(), &queue());
    assert_eq!(consumer.prefetch(), 4);
}

#[tokio::test]
async fn test_broker_new_builds_in_memory_backend() {
    let broker = Broker::new(BrokerConfig::default()).unwrap();
    broker.declare_queue(&queue()).await.unwrap();

    broker.enqueue(envelope(b"work"), None).await.unwrap();
    let mut consumer = broker
        .consume(&queue(), 1, Duration::from_millis(200))
        .await
        .unwrap();
    assert!(consumer.next().await.unwrap().is_some());
}
