//! Idempotency ledger
//!
//! Maps a request fingerprint to its in-flight or completed call record
//! so the same logical confirmation is never dispatched twice within
//! the dedup window.

use crate::domain::call::request::ValidRequest;
use crate::domain::registry::{CallRegistry, Reservation};
use std::sync::Arc;
use tracing::debug;

/// Deduplication gate in front of the dispatcher
///
/// The atomic check-and-insert happens inside
/// [`CallRegistry::reserve`]; the ledger ties it to the request
/// fingerprint and is the only path through which new records are born.
pub struct IdempotencyLedger {
    registry: Arc<CallRegistry>,
}

impl IdempotencyLedger {
    pub fn new(registry: Arc<CallRegistry>) -> Self {
        Self { registry }
    }

    /// Reserve the right to dispatch for this request
    ///
    /// `Created` grants the caller the exclusive dispatch token;
    /// `AlreadyExists` means another request already owns the call and
    /// the caller must observe its record instead.
    pub async fn reserve(&self, request: &ValidRequest) -> Reservation {
        let reservation = self.registry.reserve(request.fingerprint()).await;
        if let Reservation::AlreadyExists(record) = &reservation {
            debug!(
                fingerprint = %request.fingerprint(),
                state = record.state().as_str(),
                "duplicate call request within dedup window"
            );
        }
        reservation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::call::request::{validate, CallRequest};
    use std::time::Duration;

    fn valid_request(correlation_id: &str) -> ValidRequest {
        validate(&CallRequest {
            destination: "+14155551234".to_string(),
            message: "Your appointment is confirmed.".to_string(),
            instructions: None,
            correlation_id: correlation_id.to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_second_reservation_returns_existing_record() {
        let registry = Arc::new(CallRegistry::new(Duration::from_secs(3600)));
        let ledger = IdempotencyLedger::new(registry);
        let request = valid_request("thread-42");

        let first = ledger.reserve(&request).await;
        let second = ledger.reserve(&request).await;

        let Reservation::Created(created) = first else {
            panic!("first reservation must create");
        };
        let Reservation::AlreadyExists(existing) = second else {
            panic!("second reservation must dedup");
        };
        assert_eq!(created.fingerprint(), existing.fingerprint());
    }

    #[tokio::test]
    async fn test_distinct_conversations_get_distinct_records() {
        let registry = Arc::new(CallRegistry::new(Duration::from_secs(3600)));
        let ledger = IdempotencyLedger::new(registry.clone());

        let a = ledger.reserve(&valid_request("thread-1")).await;
        let b = ledger.reserve(&valid_request("thread-2")).await;

        assert!(matches!(a, Reservation::Created(_)));
        assert!(matches!(b, Reservation::Created(_)));
        assert_eq!(registry.count().await, 2);
    }
}
