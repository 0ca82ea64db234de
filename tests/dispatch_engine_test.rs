//! Dispatch Engine Integration Tests
//!
//! Drives the whole engine (validator, ledger, dispatcher, ingestor,
//! registry) against a stub provider, covering the idempotency and
//! lifecycle guarantees end to end.

use async_trait::async_trait;
use chrono::Utc;
use dialout::application::CallService;
use dialout::domain::call::value_object::CallState;
use dialout::domain::call::{
    CallPayload, CallRequest, ProviderCall, ProviderError, TelephonyProvider, ValidationError,
};
use dialout::domain::dispatcher::{CallDispatcher, DispatcherSettings};
use dialout::domain::ingestor::StatusIngestor;
use dialout::domain::registry::CallRegistry;
use dialout::domain::shared::value_objects::{PhoneNumber, ProviderCallId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counts provider calls and hands out sequential call ids
struct StubProvider {
    calls: AtomicUsize,
}

impl StubProvider {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelephonyProvider for StubProvider {
    async fn place_call(&self, _payload: CallPayload) -> Result<ProviderCall, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ProviderCall {
            call_id: ProviderCallId::new(format!("CA-{}", n)),
            initial_status: "queued".to_string(),
        })
    }
}

struct Engine {
    service: Arc<CallService>,
    ingestor: Arc<StatusIngestor>,
    registry: Arc<CallRegistry>,
    provider: Arc<StubProvider>,
}

fn build_engine(watchdog_deadline: Duration) -> Engine {
    let registry = Arc::new(CallRegistry::new(Duration::from_secs(3600)));
    let provider = StubProvider::new();
    let dispatcher = CallDispatcher::new(
        provider.clone(),
        registry.clone(),
        DispatcherSettings {
            from: PhoneNumber::parse("+15005550006").unwrap(),
            status_callback_url: "https://agent.example.com/call-status".to_string(),
            ring_timeout_secs: 30,
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        },
    );
    let ingestor = Arc::new(StatusIngestor::new(registry.clone()));
    let service = Arc::new(CallService::new(
        dispatcher,
        ingestor.clone(),
        registry.clone(),
        watchdog_deadline,
    ));
    Engine {
        service,
        ingestor,
        registry,
        provider,
    }
}

fn confirmation_request(correlation_id: &str) -> CallRequest {
    CallRequest {
        destination: "+14155551234".to_string(),
        message: "Your appointment is confirmed.".to_string(),
        instructions: None,
        correlation_id: correlation_id.to_string(),
    }
}

#[tokio::test]
async fn test_concurrent_identical_requests_dispatch_once() {
    let engine = build_engine(Duration::from_secs(90));

    let mut tasks = Vec::new();
    for _ in 0..12 {
        let service = engine.service.clone();
        tasks.push(tokio::spawn(async move {
            service.submit(&confirmation_request("thread-42")).await.unwrap()
        }));
    }

    let mut handles = Vec::new();
    for task in tasks {
        handles.push(task.await.unwrap());
    }

    assert_eq!(engine.provider.call_count(), 1);
    for handle in &handles {
        let record = handle.snapshot().await.unwrap();
        assert_eq!(record.provider_call_id().unwrap().as_str(), "CA-1");
    }

    // Complete the call; every caller observes the same terminal outcome
    let call_id = ProviderCallId::new("CA-1");
    for status in ["ringing", "answered", "completed"] {
        engine.ingestor.ingest(&call_id, status, Utc::now()).await;
    }
    for handle in &handles {
        assert_eq!(handle.outcome().await.unwrap(), CallState::Completed);
    }
}

#[tokio::test]
async fn test_distinct_conversations_dispatch_separately() {
    let engine = build_engine(Duration::from_secs(90));

    engine
        .service
        .submit(&confirmation_request("thread-1"))
        .await
        .unwrap();
    engine
        .service
        .submit(&confirmation_request("thread-2"))
        .await
        .unwrap();

    assert_eq!(engine.provider.call_count(), 2);
    assert_eq!(engine.registry.count().await, 2);
}

#[tokio::test]
async fn test_invalid_destination_never_reaches_provider() {
    let engine = build_engine(Duration::from_secs(90));

    let mut bad = confirmation_request("thread-42");
    bad.destination = "5551234".to_string();

    let result = engine.service.submit(&bad).await;
    assert!(matches!(result, Err(ValidationError::InvalidDestination(_))));
    assert_eq!(engine.provider.call_count(), 0);
}

#[tokio::test]
async fn test_silent_call_times_out_and_late_callback_is_ignored() {
    let engine = build_engine(Duration::from_millis(30));

    let handle = engine
        .service
        .submit(&confirmation_request("thread-42"))
        .await
        .unwrap();

    assert_eq!(handle.outcome().await.unwrap(), CallState::TimedOut);

    // A callback arriving afterward is acknowledged but changes nothing
    engine
        .ingestor
        .ingest(&ProviderCallId::new("CA-1"), "completed", Utc::now())
        .await;
    assert_eq!(
        handle.snapshot().await.unwrap().state(),
        CallState::TimedOut
    );
}

#[tokio::test]
async fn test_reordered_callbacks_settle_on_highest_precedence() {
    let engine = build_engine(Duration::from_secs(90));

    let handle = engine
        .service
        .submit(&confirmation_request("thread-42"))
        .await
        .unwrap();
    let call_id = ProviderCallId::new("CA-1");

    // ringing, completed, then a late duplicate ringing
    for status in ["ringing", "completed", "ringing"] {
        engine.ingestor.ingest(&call_id, status, Utc::now()).await;
    }

    assert_eq!(handle.outcome().await.unwrap(), CallState::Completed);
    let record = handle.snapshot().await.unwrap();
    // Pending, Dispatched, Ringing, Completed; the duplicate left no trace
    assert_eq!(record.transitions().len(), 4);
}
