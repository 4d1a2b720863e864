//! Message types: queue names, envelopes, and leased messages.

use crate::error::{CodecError, ValidationError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;

/// Suffix appended to a queue name to derive its dead-letter partner.
///
/// This is a wire-level contract: external tooling locates dead-letter queues
/// by this suffix, so it must never change.
pub const DEAD_LETTER_SUFFIX: &str = "-dlq";

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Validated queue name following Azure Storage queue naming rules
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueName(String);

impl QueueName {
    /// Create new queue name with validation
    ///
    /// Azure Storage queue names are 3-63 characters of lowercase ASCII
    /// letters, digits, and hyphens; they must start and end with a letter or
    /// digit and may not contain consecutive hyphens.
    pub fn new(name: String) -> Result<Self, ValidationError> {
        if name.len() < 3 || name.len() > 63 {
            return Err(ValidationError::OutOfRange {
                field: "queue_name".to_string(),
                message: "must be 3-63 characters".to_string(),
            });
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "only lowercase ASCII letters, digits, and hyphens allowed".to_string(),
            });
        }

        if name.starts_with('-') || name.ends_with('-') || name.contains("--") {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "no leading/trailing hyphens or consecutive hyphens".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Derive the paired dead-letter queue name (`<name>-dlq`)
    ///
    /// Fails when the derived name would exceed the 63-character limit.
    pub fn dead_letter(&self) -> Result<Self, ValidationError> {
        Self::new(format!("{}{}", self.0, DEAD_LETTER_SUFFIX))
    }

    /// Get queue name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

/// Unique identifier embedded in every envelope
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Generate new random message ID
    pub fn new() -> Self {
        let id = uuid::Uuid::new_v4();
        Self(id.to_string())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "message_id".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// The task-framework unit of work: an opaque payload plus routing identity
///
/// The broker never inspects `body` beyond the encode/decode round trip; task
/// semantics live entirely in the host framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub queue_name: QueueName,
    pub message_id: MessageId,
    #[serde(with = "bytes_serde")]
    pub body: Bytes,
}

/// Custom serialization for Bytes
mod bytes_serde {
    use base64::{engine::general_purpose, Engine as _};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded = general_purpose::STANDARD.encode(bytes);
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let decoded = general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)?;
        Ok(Bytes::from(decoded))
    }
}

impl Envelope {
    /// Create new envelope with a fresh message ID
    pub fn new(queue_name: QueueName, body: Bytes) -> Self {
        Self {
            queue_name,
            message_id: MessageId::new(),
            body,
        }
    }

    /// Encode the envelope to its wire representation
    pub fn encode(&self) -> Result<Bytes, CodecError> {
        let encoded = serde_json::to_vec(self)?;
        Ok(Bytes::from(encoded))
    }

    /// Decode an envelope from its wire representation
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        let envelope = serde_json::from_slice(payload)?;
        Ok(envelope)
    }
}

// ============================================================================
// Backend Receipts
// ============================================================================

/// Opaque token pair required to resolve a leased message
///
/// The backend identifies a lease by the message's service-side ID plus the
/// pop receipt issued at receive time; a message re-leased after visibility
/// expiry gets a fresh pop receipt, invalidating the old one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseReceipt {
    message_id: String,
    pop_receipt: String,
}

impl LeaseReceipt {
    /// Create new lease receipt
    pub fn new(message_id: String, pop_receipt: String) -> Self {
        Self {
            message_id,
            pop_receipt,
        }
    }

    /// Service-side message identifier
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Pop receipt issued by the most recent receive
    pub fn pop_receipt(&self) -> &str {
        &self.pop_receipt
    }
}

/// A raw item returned by a backend batch fetch
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub receipt: LeaseReceipt,
    pub payload: Bytes,
}

// ============================================================================
// Leased Message
// ============================================================================

/// A fetched message held under a backend lease
///
/// Combines the lease receipt, the original wire bytes (forwarded verbatim to
/// the dead-letter queue on nack), and the decoded envelope. Handed out by
/// [`Consumer::next`](crate::consumer::Consumer::next); the caller must
/// resolve it exactly once via ack, nack, or requeue. An unresolved lease
/// reappears on the backend once its visibility window elapses.
#[derive(Debug, Clone)]
pub struct LeasedMessage {
    receipt: LeaseReceipt,
    encoded: Bytes,
    envelope: Envelope,
}

impl LeasedMessage {
    /// Decode a raw backend item into a leased message
    pub fn from_raw(raw: RawMessage) -> Result<Self, CodecError> {
        let envelope = Envelope::decode(&raw.payload)?;
        Ok(Self {
            receipt: raw.receipt,
            encoded: raw.payload,
            envelope,
        })
    }

    /// The decoded envelope
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// The envelope's unique identifier
    pub fn message_id(&self) -> &MessageId {
        &self.envelope.message_id
    }

    /// The lease receipt for backend resolution
    pub fn receipt(&self) -> &LeaseReceipt {
        &self.receipt
    }

    /// The original wire bytes, exactly as fetched
    pub fn encoded(&self) -> &Bytes {
        &self.encoded
    }
}

/// Equality is by envelope identity, not lease identity: a requeued message
/// carries a fresh receipt but is the same logical message.
impl PartialEq for LeasedMessage {
    fn eq(&self, other: &Self) -> bool {
        self.envelope == other.envelope
    }
}

impl Eq for LeasedMessage {}
