//! Queue service backend implementations.

pub mod azure;
pub mod memory;

pub use azure::AzureQueueBackend;
pub use memory::InMemoryBackend;
