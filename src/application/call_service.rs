//! Submit-call use case

use crate::domain::call::record::CallRecord;
use crate::domain::call::request::{validate, CallRequest, ValidationError};
use crate::domain::call::value_object::CallState;
use crate::domain::dispatcher::CallDispatcher;
use crate::domain::ingestor::StatusIngestor;
use crate::domain::ledger::IdempotencyLedger;
use crate::domain::registry::{CallRegistry, Reservation, StateSubscription};
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::CallFingerprint;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Handle the conversation keeps to observe a call's outcome
///
/// Cheap to clone; reads go through the registry, so the handle always
/// reflects the live record.
#[derive(Clone)]
pub struct CallHandle {
    fingerprint: CallFingerprint,
    registry: Arc<CallRegistry>,
}

impl CallHandle {
    pub fn fingerprint(&self) -> &CallFingerprint {
        &self.fingerprint
    }

    /// Point-in-time snapshot of the record
    pub async fn snapshot(&self) -> Option<CallRecord> {
        self.registry.get(&self.fingerprint).await
    }

    /// Subscribe to the record's state transitions
    pub async fn subscribe(&self) -> Option<StateSubscription> {
        self.registry.subscribe(&self.fingerprint).await
    }

    /// Await the terminal state without polling
    pub async fn outcome(&self) -> Result<CallState> {
        let mut subscription = self
            .subscribe()
            .await
            .ok_or_else(|| crate::domain::DomainError::NotFound(self.fingerprint.to_string()))?;
        subscription.wait_terminal().await
    }
}

/// Application service coordinating the dispatch engine
pub struct CallService {
    ledger: IdempotencyLedger,
    dispatcher: CallDispatcher,
    ingestor: Arc<StatusIngestor>,
    registry: Arc<CallRegistry>,
    watchdog_deadline: Duration,
}

impl CallService {
    pub fn new(
        dispatcher: CallDispatcher,
        ingestor: Arc<StatusIngestor>,
        registry: Arc<CallRegistry>,
        watchdog_deadline: Duration,
    ) -> Self {
        Self {
            ledger: IdempotencyLedger::new(registry.clone()),
            dispatcher,
            ingestor,
            registry,
            watchdog_deadline,
        }
    }

    /// Submit a call request on behalf of a conversation
    ///
    /// Returns a validation error synchronously, before any side
    /// effect. Otherwise the request is deduplicated against the
    /// ledger, dispatched at most once, and a handle is returned either
    /// way. A dispatch failure is not an error here: the record is
    /// `Failed` and the handle reports it, scoped to this call only.
    pub async fn submit(&self, request: &CallRequest) -> std::result::Result<CallHandle, ValidationError> {
        let valid = validate(request)?;
        let fingerprint = valid.fingerprint().clone();

        match self.ledger.reserve(&valid).await {
            Reservation::AlreadyExists(record) => {
                info!(
                    fingerprint = %fingerprint,
                    correlation_id = %valid.correlation_id(),
                    state = record.state().as_str(),
                    "request deduplicated onto existing call"
                );
            }
            Reservation::Created(record) => {
                info!(
                    fingerprint = %fingerprint,
                    correlation_id = %valid.correlation_id(),
                    destination = %valid.destination(),
                    "dispatching new outbound call"
                );
                match self.dispatcher.dispatch(&valid, &record).await {
                    Ok(_) => {
                        self.ingestor
                            .spawn_watchdog(fingerprint.clone(), self.watchdog_deadline);
                    }
                    Err(e) => {
                        // Record is already marked Failed; the handle
                        // lets the conversation see it.
                        warn!(fingerprint = %fingerprint, error = %e, "dispatch failed");
                    }
                }
            }
        }

        Ok(CallHandle {
            fingerprint,
            registry: self.registry.clone(),
        })
    }

    /// Periodically sweep terminal records past the dedup window
    pub fn spawn_eviction(&self, interval: Duration) -> JoinHandle<()> {
        let registry = self.registry.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let evicted = registry.evict_expired().await;
                if evicted > 0 {
                    info!(evicted, "evicted expired call records");
                }
            }
        })
    }
}
