//! Broker and backend configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Configuration for broker construction
///
/// Passed explicitly into [`Broker::new`](crate::broker::Broker::new) so that
/// a process can run several independently configured brokers; there is no
/// ambient connection state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub backend: BackendConfig,

    /// Whether declared queues get a paired `-dlq` queue and nack routes to it
    pub dead_letter: bool,

    /// Whether declaration creates missing queues or requires provisioning
    pub create_mode: QueueCreateMode,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::InMemory(InMemoryConfig::default()),
            dead_letter: false,
            create_mode: QueueCreateMode::CreateIfMissing,
        }
    }
}

/// Queue provisioning policy applied at declaration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueCreateMode {
    /// Create backend queues on first declaration, tolerating creation races
    CreateIfMissing,
    /// Require queues to be provisioned out of band; a missing queue is fatal
    ///
    /// Avoids granting queue-create permission to production deployments.
    RequireExisting,
}

/// Backend-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BackendConfig {
    Azure(AzureQueueConfig),
    InMemory(InMemoryConfig),
}

/// Azure Storage Queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureQueueConfig {
    /// Storage account name
    pub account: String,

    /// Base64-encoded shared access key
    pub access_key: String,

    /// Endpoint override for emulators; defaults to
    /// `https://{account}.queue.core.windows.net`
    pub endpoint: Option<String>,
}

/// In-memory backend configuration
///
/// Defaults mirror the Azure Storage Queue service limits so tests exercise
/// the same failure surface as production.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InMemoryConfig {
    /// Maximum encoded payload size accepted by send
    pub max_message_bytes: usize,

    /// Maximum initial-invisibility window accepted by send
    pub max_delay: Duration,

    /// Largest batch a single receive may return
    pub page_limit: u32,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: 64 * 1024,
            max_delay: Duration::from_secs(7 * 24 * 60 * 60),
            page_limit: 32,
        }
    }
}
