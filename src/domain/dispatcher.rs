//! Call dispatcher
//!
//! Hands a validated, reserved request to the telephony provider
//! exactly once, with bounded retry for transient failures.

use crate::domain::call::provider::{CallPayload, TelephonyProvider};
use crate::domain::call::record::CallRecord;
use crate::domain::call::request::ValidRequest;
use crate::domain::call::value_object::CallState;
use crate::domain::registry::CallRegistry;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::PhoneNumber;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Dispatch-side settings, fixed at startup
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// Originating number the provider shows to the callee
    pub from: PhoneNumber,
    /// Where the provider delivers status callbacks
    pub status_callback_url: String,
    /// How long the provider lets the call ring
    pub ring_timeout_secs: u32,
    /// Total attempts per record, first try included
    pub max_attempts: u32,
    /// Backoff base delay, doubled per attempt
    pub base_delay: Duration,
    /// Backoff ceiling
    pub max_delay: Duration,
}

/// Places provider calls for `Created` reservations
///
/// Holds no lock across the provider's network I/O; the reservation is
/// the mutual-exclusion token. A record that is not `Pending` is
/// rejected up front, so re-submission can never place a second call.
pub struct CallDispatcher {
    provider: Arc<dyn TelephonyProvider>,
    registry: Arc<CallRegistry>,
    settings: DispatcherSettings,
}

impl CallDispatcher {
    pub fn new(
        provider: Arc<dyn TelephonyProvider>,
        registry: Arc<CallRegistry>,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            provider,
            registry,
            settings,
        }
    }

    /// Dispatch a reserved `Pending` record to the provider
    ///
    /// On acceptance the record becomes `Dispatched` and carries the
    /// provider call id. Permanent provider errors mark the record
    /// `Failed` immediately; transient ones are retried with
    /// exponential backoff and jitter until the attempt budget runs
    /// out, then `Failed`.
    pub async fn dispatch(
        &self,
        request: &ValidRequest,
        record: &CallRecord,
    ) -> Result<CallRecord> {
        if record.state() != CallState::Pending {
            return Err(DomainError::AlreadyDispatched(
                record.fingerprint().to_string(),
            ));
        }

        let fingerprint = request.fingerprint();
        let payload = CallPayload {
            to: request.destination().clone(),
            from: self.settings.from.clone(),
            spoken_message: request.spoken_message(),
            status_callback_url: self.settings.status_callback_url.clone(),
            ring_timeout_secs: self.settings.ring_timeout_secs,
        };

        loop {
            let attempt = self.registry.record_attempt(fingerprint).await?;

            match self.provider.place_call(payload.clone()).await {
                Ok(call) => {
                    info!(
                        fingerprint = %fingerprint,
                        call_id = %call.call_id,
                        initial_status = %call.initial_status,
                        attempt,
                        "provider accepted outbound call"
                    );
                    return self
                        .registry
                        .mark_dispatched(fingerprint, call.call_id)
                        .await;
                }
                Err(e) if e.is_transient() && attempt < self.settings.max_attempts => {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        fingerprint = %fingerprint,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient dispatch failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(
                        fingerprint = %fingerprint,
                        attempt,
                        error = %e,
                        "dispatch failed permanently"
                    );
                    self.registry
                        .mark_failed(fingerprint, &e.to_string())
                        .await?;
                    return Err(DomainError::DispatchFailed(e.to_string()));
                }
            }
        }
    }

    /// Exponential backoff with jitter: base * 2^(attempt-1), capped,
    /// plus up to 50% random spread
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let scaled = self
            .settings
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.settings.max_delay);
        let jitter_ms = scaled.as_millis() as u64 / 2;
        let jitter = if jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=jitter_ms)
        } else {
            0
        };
        scaled + Duration::from_millis(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::call::provider::{MockTelephonyProvider, ProviderCall, ProviderError};
    use crate::domain::call::request::{validate, CallRequest};
    use crate::domain::registry::Reservation;
    use crate::domain::shared::value_objects::ProviderCallId;

    fn valid_request() -> ValidRequest {
        validate(&CallRequest {
            destination: "+14155551234".to_string(),
            message: "Your appointment is confirmed.".to_string(),
            instructions: None,
            correlation_id: "thread-42".to_string(),
        })
        .unwrap()
    }

    fn settings() -> DispatcherSettings {
        DispatcherSettings {
            from: PhoneNumber::parse("+15005550006").unwrap(),
            status_callback_url: "https://example.com/call-status".to_string(),
            ring_timeout_secs: 30,
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    async fn reserved(registry: &CallRegistry, request: &ValidRequest) -> CallRecord {
        match registry.reserve(request.fingerprint()).await {
            Reservation::Created(record) => record,
            Reservation::AlreadyExists(_) => panic!("expected fresh reservation"),
        }
    }

    fn accepted_call() -> ProviderCall {
        ProviderCall {
            call_id: ProviderCallId::new("CA123"),
            initial_status: "queued".to_string(),
        }
    }

    #[tokio::test]
    async fn test_successful_dispatch() {
        let mut provider = MockTelephonyProvider::new();
        provider
            .expect_place_call()
            .times(1)
            .returning(|_| Ok(accepted_call()));

        let registry = Arc::new(CallRegistry::new(Duration::from_secs(3600)));
        let request = valid_request();
        let record = reserved(&registry, &request).await;

        let dispatcher = CallDispatcher::new(Arc::new(provider), registry.clone(), settings());
        let dispatched = dispatcher.dispatch(&request, &record).await.unwrap();

        assert_eq!(dispatched.state(), CallState::Dispatched);
        assert_eq!(dispatched.provider_call_id().unwrap().as_str(), "CA123");
        assert_eq!(dispatched.attempts(), 1);
    }

    #[tokio::test]
    async fn test_payload_carries_request_and_settings() {
        let mut provider = MockTelephonyProvider::new();
        provider
            .expect_place_call()
            .withf(|payload: &CallPayload| {
                payload.to.as_str() == "+14155551234"
                    && payload.from.as_str() == "+15005550006"
                    && payload.status_callback_url == "https://example.com/call-status"
                    && payload.ring_timeout_secs == 30
                    && payload.spoken_message == "Your appointment is confirmed."
            })
            .times(1)
            .returning(|_| Ok(accepted_call()));

        let registry = Arc::new(CallRegistry::new(Duration::from_secs(3600)));
        let request = valid_request();
        let record = reserved(&registry, &request).await;

        let dispatcher = CallDispatcher::new(Arc::new(provider), registry, settings());
        dispatcher.dispatch(&request, &record).await.unwrap();
    }

    #[tokio::test]
    async fn test_permanent_error_fails_without_retry() {
        let mut provider = MockTelephonyProvider::new();
        provider
            .expect_place_call()
            .times(1)
            .returning(|_| Err(ProviderError::InvalidDestination("+1999".to_string())));

        let registry = Arc::new(CallRegistry::new(Duration::from_secs(3600)));
        let request = valid_request();
        let record = reserved(&registry, &request).await;

        let dispatcher = CallDispatcher::new(Arc::new(provider), registry.clone(), settings());
        let result = dispatcher.dispatch(&request, &record).await;

        assert!(matches!(result, Err(DomainError::DispatchFailed(_))));
        let stored = registry.get(request.fingerprint()).await.unwrap();
        assert_eq!(stored.state(), CallState::Failed);
        assert!(stored.last_error().unwrap().contains("+1999"));
    }

    #[tokio::test]
    async fn test_transient_error_retried_then_succeeds() {
        let mut provider = MockTelephonyProvider::new();
        let mut calls = 0;
        provider.expect_place_call().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(ProviderError::Transient("connection reset".to_string()))
            } else {
                Ok(accepted_call())
            }
        });

        let registry = Arc::new(CallRegistry::new(Duration::from_secs(3600)));
        let request = valid_request();
        let record = reserved(&registry, &request).await;

        let dispatcher = CallDispatcher::new(Arc::new(provider), registry, settings());
        let dispatched = dispatcher.dispatch(&request, &record).await.unwrap();

        assert_eq!(dispatched.state(), CallState::Dispatched);
        assert_eq!(dispatched.attempts(), 2);
    }

    #[tokio::test]
    async fn test_transient_errors_exhaust_attempt_budget() {
        let mut provider = MockTelephonyProvider::new();
        provider
            .expect_place_call()
            .times(3)
            .returning(|_| Err(ProviderError::Transient("gateway timeout".to_string())));

        let registry = Arc::new(CallRegistry::new(Duration::from_secs(3600)));
        let request = valid_request();
        let record = reserved(&registry, &request).await;

        let dispatcher = CallDispatcher::new(Arc::new(provider), registry.clone(), settings());
        let result = dispatcher.dispatch(&request, &record).await;

        assert!(matches!(result, Err(DomainError::DispatchFailed(_))));
        let stored = registry.get(request.fingerprint()).await.unwrap();
        assert_eq!(stored.state(), CallState::Failed);
        assert_eq!(stored.attempts(), 3);
    }

    #[tokio::test]
    async fn test_non_pending_record_rejected() {
        let provider = MockTelephonyProvider::new(); // must never be called

        let registry = Arc::new(CallRegistry::new(Duration::from_secs(3600)));
        let request = valid_request();
        let record = reserved(&registry, &request).await;
        let dispatched = registry
            .mark_dispatched(request.fingerprint(), ProviderCallId::new("CA123"))
            .await
            .unwrap();

        let dispatcher = CallDispatcher::new(Arc::new(provider), registry, settings());
        let result = dispatcher.dispatch(&request, &dispatched).await;

        assert!(matches!(result, Err(DomainError::AlreadyDispatched(_))));
        drop(record);
    }
}
