//! Status event ingestor
//!
//! Receives asynchronous lifecycle callbacks from the provider and
//! drives each call record's state machine. Delivery is at-least-once
//! and possibly out of order, so every transition here is idempotent:
//! duplicates and late arrivals are acknowledged and ignored.

use crate::domain::call::event::LifecycleEvent;
use crate::domain::call::record::CallRecord;
use crate::domain::registry::{ApplyOutcome, CallRegistry};
use crate::domain::shared::value_objects::{CallFingerprint, ProviderCallId};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Why a callback was rejected
///
/// Rejections are logged and still acknowledged to the provider at the
/// transport layer, so they never trigger redelivery storms and never
/// touch an existing record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// No record carries this provider call id
    UnknownCallId,
    /// The status string is not part of the provider vocabulary
    MalformedEvent(String),
}

/// Outcome of ingesting one provider callback
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// The event advanced the record
    Applied(CallRecord),
    /// Duplicate or out-of-order event, acknowledged and dropped
    Ignored(CallRecord),
    /// Callback could not be matched to a record
    Rejected(RejectReason),
}

/// Applies provider status callbacks to the registry
pub struct StatusIngestor {
    registry: Arc<CallRegistry>,
}

impl StatusIngestor {
    pub fn new(registry: Arc<CallRegistry>) -> Self {
        Self { registry }
    }

    /// Ingest one lifecycle callback
    pub async fn ingest(
        &self,
        call_id: &ProviderCallId,
        status: &str,
        at: DateTime<Utc>,
    ) -> IngestOutcome {
        let Some(event) = LifecycleEvent::from_provider_status(status) else {
            warn!(call_id = %call_id, status, "malformed status callback");
            return IngestOutcome::Rejected(RejectReason::MalformedEvent(status.to_string()));
        };

        match self.registry.apply_event(call_id, event, at).await {
            ApplyOutcome::Applied(record) => {
                info!(
                    call_id = %call_id,
                    event = event.as_str(),
                    state = record.state().as_str(),
                    "call state advanced"
                );
                IngestOutcome::Applied(record)
            }
            ApplyOutcome::Ignored(record) => {
                info!(
                    call_id = %call_id,
                    event = event.as_str(),
                    state = record.state().as_str(),
                    "out-of-order or duplicate event ignored"
                );
                IngestOutcome::Ignored(record)
            }
            ApplyOutcome::Unknown => {
                warn!(call_id = %call_id, event = event.as_str(), "callback for unknown call id");
                IngestOutcome::Rejected(RejectReason::UnknownCallId)
            }
        }
    }

    /// Arm the timeout watchdog for a freshly dispatched record
    ///
    /// If no terminal event lands within `deadline` the record becomes
    /// `TimedOut`; the watchdog is cancelled the instant a terminal
    /// callback arrives. Both paths go through the registry lock, so
    /// whichever lands first wins and the other is a no-op.
    pub fn spawn_watchdog(
        &self,
        fingerprint: CallFingerprint,
        deadline: Duration,
    ) -> JoinHandle<()> {
        let registry = self.registry.clone();
        tokio::spawn(async move {
            let Some(mut subscription) = registry.subscribe(&fingerprint).await else {
                return;
            };
            tokio::select! {
                _ = tokio::time::sleep(deadline) => {
                    if registry.time_out(&fingerprint).await {
                        warn!(
                            fingerprint = %fingerprint,
                            deadline_secs = deadline.as_secs(),
                            "no terminal callback before deadline, call timed out"
                        );
                    }
                }
                _ = subscription.wait_terminal() => {}
            }
        })
    }
}
