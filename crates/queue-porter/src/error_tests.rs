//! Tests for error types.

use super::*;

#[test]
fn test_backend_error_transience() {
    assert!(BackendError::Network("connection reset".to_string()).is_transient());

    assert!(BackendError::Service {
        code: "InternalError".to_string(),
        message: "server busy".to_string(),
    }
    .is_transient());

    assert!(!BackendError::NotFound {
        queue_name: "tasks".to_string(),
    }
    .is_transient());

    assert!(!BackendError::MessageTooLarge {
        size: 100_000,
        max_size: 65_536,
    }
    .is_transient());

    assert!(!BackendError::Authentication("bad key".to_string()).is_transient());
}

#[test]
fn test_broker_error_wraps_backend_error() {
    let error: BrokerError = BackendError::DelayTooLong {
        requested: Duration::from_secs(8 * 24 * 60 * 60),
        max: Duration::from_secs(7 * 24 * 60 * 60),
    }
    .into();

    assert!(matches!(error, BrokerError::Backend(_)));
}
