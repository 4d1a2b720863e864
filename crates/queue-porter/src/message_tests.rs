//! Tests for message types.

use super::*;

#[test]
fn test_queue_name_validation() {
    assert!(QueueName::new("tasks".to_string()).is_ok());
    assert!(QueueName::new("my-queue-7".to_string()).is_ok());

    // Too short / too long
    assert!(QueueName::new("ab".to_string()).is_err());
    assert!(QueueName::new("a".repeat(64)).is_err());

    // Character set
    assert!(QueueName::new("Tasks".to_string()).is_err());
    assert!(QueueName::new("my_queue".to_string()).is_err());
    assert!(QueueName::new("my.queue".to_string()).is_err());

    // Hyphen placement
    assert!(QueueName::new("-tasks".to_string()).is_err());
    assert!(QueueName::new("tasks-".to_string()).is_err());
    assert!(QueueName::new("my--queue".to_string()).is_err());
}

#[test]
fn test_dead_letter_name_derivation() {
    let queue = QueueName::new("tasks".to_string()).unwrap();
    let dlq = queue.dead_letter().unwrap();
    assert_eq!(dlq.as_str(), "tasks-dlq");

    // Derivation must not push the name past the length limit
    let long = QueueName::new("a".repeat(63)).unwrap();
    assert!(long.dead_letter().is_err());
}

#[test]
fn test_message_id_from_str() {
    use std::str::FromStr;

    assert!(MessageId::from_str("").is_err());
    let id = MessageId::from_str("abc-123").unwrap();
    assert_eq!(id.as_str(), "abc-123");
}

#[test]
fn test_envelope_round_trip() {
    let queue = QueueName::new("tasks".to_string()).unwrap();
    let envelope = Envelope::new(queue, Bytes::from_static(b"\x00\x01payload\xff"));

    let encoded = envelope.encode().unwrap();
    let decoded = Envelope::decode(&encoded).unwrap();

    assert_eq!(decoded, envelope);
    assert_eq!(decoded.body, envelope.body);
}

#[test]
fn test_envelope_decode_rejects_garbage() {
    assert!(Envelope::decode(b"not json").is_err());
    assert!(Envelope::decode(b"{\"queue_name\":\"tasks\"}").is_err());
}

#[test]
fn test_leased_message_equality_ignores_receipt() {
    let queue = QueueName::new("tasks".to_string()).unwrap();
    let envelope = Envelope::new(queue, Bytes::from_static(b"work"));
    let encoded = envelope.encode().unwrap();

    let first = LeasedMessage::from_raw(RawMessage {
        receipt: LeaseReceipt::new("id-1".to_string(), "pop-1".to_string()),
        payload: encoded.clone(),
    })
    .unwrap();

    let second = LeasedMessage::from_raw(RawMessage {
        receipt: LeaseReceipt::new("id-2".to_string(), "pop-2".to_string()),
        payload: encoded,
    })
    .unwrap();

    // Same logical message under two different leases
    assert_eq!(first, second);
    assert_ne!(first.receipt(), second.receipt());
}

#[test]
fn test_leased_message_preserves_wire_bytes() {
    let queue = QueueName::new("tasks".to_string()).unwrap();
    let envelope = Envelope::new(queue, Bytes::from_static(b"work"));
    let encoded = envelope.encode().unwrap();

    let leased = LeasedMessage::from_raw(RawMessage {
        receipt: LeaseReceipt::new("id-1".to_string(), "pop-1".to_string()),
        payload: encoded.clone(),
    })
    .unwrap();

    assert_eq!(leased.encoded(), &encoded);
    assert_eq!(leased.message_id(), &leased.envelope().message_id);
}

#[test]
fn test_leased_message_from_raw_rejects_malformed_payload() {
    let raw = RawMessage {
        receipt: LeaseReceipt::new("id-1".to_string(), "pop-1".to_string()),
        payload: Bytes::from_static(b"\x00garbage"),
    };

    assert!(LeasedMessage::from_raw(raw).is_err());
}
