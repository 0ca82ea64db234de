//! Call registry - shared store of call records
//!
//! The registry owns every [`CallRecord`]. The dispatcher and the status
//! ingestor are the only writers; conversation logic reads through
//! [`CallRegistry::get`] or awaits the outcome through
//! [`CallRegistry::subscribe`]. The `reserve` operation is the single
//! mutual-exclusion boundary that prevents two concurrent requests for
//! the same logical call from dispatching twice.

use crate::domain::call::event::LifecycleEvent;
use crate::domain::call::record::CallRecord;
use crate::domain::call::value_object::CallState;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{CallFingerprint, ProviderCallId};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::debug;

/// Outcome of an idempotency reservation
#[derive(Debug, Clone)]
pub enum Reservation {
    /// No record existed; a fresh `Pending` record was inserted and the
    /// caller holds the exclusive right to dispatch it.
    Created(CallRecord),
    /// A record already exists inside the dedup window; the caller must
    /// not dispatch again.
    AlreadyExists(CallRecord),
}

/// Outcome of applying a provider lifecycle event
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    /// The event advanced the record's state
    Applied(CallRecord),
    /// Duplicate or out-of-order event; record untouched
    Ignored(CallRecord),
    /// No record carries this provider call id
    Unknown,
}

struct CallEntry {
    record: CallRecord,
    // Carries the full state history so a slow subscriber still sees
    // every transition in order, not just the latest value.
    state_tx: watch::Sender<Vec<CallState>>,
}

fn state_history(record: &CallRecord) -> Vec<CallState> {
    record.transitions().iter().map(|t| t.state).collect()
}

struct Store {
    records: HashMap<CallFingerprint, CallEntry>,
    by_call_id: HashMap<ProviderCallId, CallFingerprint>,
}

/// Thread-safe store of call records keyed by fingerprint, with a
/// secondary index by provider call id
pub struct CallRegistry {
    store: RwLock<Store>,
    dedup_window: ChronoDuration,
}

impl CallRegistry {
    pub fn new(dedup_window: Duration) -> Self {
        Self {
            store: RwLock::new(Store {
                records: HashMap::new(),
                by_call_id: HashMap::new(),
            }),
            dedup_window: ChronoDuration::from_std(dedup_window)
                .unwrap_or_else(|_| ChronoDuration::hours(1)),
        }
    }

    /// Atomic check-and-insert for a fingerprint
    ///
    /// This is the idempotency ledger's synchronization point: under the
    /// write lock, either an existing in-window record is returned or a
    /// fresh `Pending` one is inserted. The lock is released before any
    /// network I/O happens; the `Created` reservation itself is the
    /// mutual-exclusion token.
    pub async fn reserve(&self, fingerprint: &CallFingerprint) -> Reservation {
        let mut store = self.store.write().await;
        let now = Utc::now();

        if let Some(entry) = store.records.get(fingerprint) {
            if !self.is_evictable(&entry.record, now) {
                return Reservation::AlreadyExists(entry.record.clone());
            }
            // Outside the dedup window: drop the stale record so a fresh
            // request may dispatch again.
            debug!(fingerprint = %fingerprint, "evicting expired call record on reserve");
            self.remove_entry(&mut store, fingerprint);
        }

        let record = CallRecord::new(fingerprint.clone());
        let (state_tx, _) = watch::channel(state_history(&record));
        store.records.insert(
            fingerprint.clone(),
            CallEntry {
                record: record.clone(),
                state_tx,
            },
        );
        Reservation::Created(record)
    }

    /// Record provider acceptance: `Pending` -> `Dispatched`
    pub async fn mark_dispatched(
        &self,
        fingerprint: &CallFingerprint,
        call_id: ProviderCallId,
    ) -> Result<CallRecord> {
        let mut store = self.store.write().await;
        let entry = store
            .records
            .get_mut(fingerprint)
            .ok_or_else(|| DomainError::NotFound(fingerprint.to_string()))?;

        entry.record.mark_dispatched(call_id.clone())?;
        let record = entry.record.clone();
        entry.state_tx.send_replace(state_history(&record));
        store.by_call_id.insert(call_id, fingerprint.clone());
        Ok(record)
    }

    /// Count one dispatch attempt against the retry budget
    pub async fn record_attempt(&self, fingerprint: &CallFingerprint) -> Result<u32> {
        let mut store = self.store.write().await;
        let entry = store
            .records
            .get_mut(fingerprint)
            .ok_or_else(|| DomainError::NotFound(fingerprint.to_string()))?;
        entry.record.record_attempt();
        Ok(entry.record.attempts())
    }

    /// Mark a record `Failed` with an error detail
    pub async fn mark_failed(
        &self,
        fingerprint: &CallFingerprint,
        error: &str,
    ) -> Result<CallRecord> {
        let mut store = self.store.write().await;
        let entry = store
            .records
            .get_mut(fingerprint)
            .ok_or_else(|| DomainError::NotFound(fingerprint.to_string()))?;

        entry.record.mark_failed(error)?;
        let record = entry.record.clone();
        entry.state_tx.send_replace(state_history(&record));
        Ok(record)
    }

    /// Apply a provider lifecycle event to the record owning `call_id`
    pub async fn apply_event(
        &self,
        call_id: &ProviderCallId,
        event: LifecycleEvent,
        at: DateTime<Utc>,
    ) -> ApplyOutcome {
        let mut store = self.store.write().await;
        let Some(fingerprint) = store.by_call_id.get(call_id).cloned() else {
            return ApplyOutcome::Unknown;
        };
        let Some(entry) = store.records.get_mut(&fingerprint) else {
            return ApplyOutcome::Unknown;
        };

        if entry.record.apply_event(event, at) {
            let record = entry.record.clone();
            entry.state_tx.send_replace(state_history(&record));
            ApplyOutcome::Applied(record)
        } else {
            ApplyOutcome::Ignored(entry.record.clone())
        }
    }

    /// Expire a dispatched record that never reported a terminal event
    ///
    /// Exactly-once under the write lock: if a terminal callback landed
    /// first, this is a no-op and returns `false`.
    pub async fn time_out(&self, fingerprint: &CallFingerprint) -> bool {
        let mut store = self.store.write().await;
        let Some(entry) = store.records.get_mut(fingerprint) else {
            return false;
        };
        if entry.record.time_out() {
            entry.state_tx.send_replace(state_history(&entry.record));
            true
        } else {
            false
        }
    }

    /// Point-in-time read by fingerprint
    pub async fn get(&self, fingerprint: &CallFingerprint) -> Option<CallRecord> {
        let store = self.store.read().await;
        store.records.get(fingerprint).map(|e| e.record.clone())
    }

    /// Point-in-time read by provider call id
    pub async fn get_by_call_id(&self, call_id: &ProviderCallId) -> Option<CallRecord> {
        let store = self.store.read().await;
        let fingerprint = store.by_call_id.get(call_id)?;
        store.records.get(fingerprint).map(|e| e.record.clone())
    }

    /// Subscribe to the record's state transitions
    ///
    /// The first yielded item is the state at subscription time; after
    /// that every transition is yielded in order, however slowly the
    /// subscriber polls. The terminal state ends the sequence, and if
    /// the record is already terminal it is yielded immediately.
    pub async fn subscribe(&self, fingerprint: &CallFingerprint) -> Option<StateSubscription> {
        let store = self.store.read().await;
        let entry = store.records.get(fingerprint)?;
        let rx = entry.state_tx.subscribe();
        // Start the cursor at the current state, not the beginning of
        // the history: earlier transitions happened before this
        // subscriber existed.
        let cursor = rx.borrow().len().saturating_sub(1);
        Some(StateSubscription {
            rx,
            cursor,
            done: false,
        })
    }

    /// Sweep out records whose dedup window has elapsed
    ///
    /// Only terminal records are evicted; an in-flight record is never
    /// removed, preserving the one-dispatch-per-fingerprint invariant.
    pub async fn evict_expired(&self) -> usize {
        let mut store = self.store.write().await;
        let now = Utc::now();
        let expired: Vec<CallFingerprint> = store
            .records
            .iter()
            .filter(|(_, entry)| self.is_evictable(&entry.record, now))
            .map(|(fingerprint, _)| fingerprint.clone())
            .collect();

        for fingerprint in &expired {
            debug!(fingerprint = %fingerprint, "evicting expired call record");
            self.remove_entry(&mut store, fingerprint);
        }
        expired.len()
    }

    /// Number of records currently held
    pub async fn count(&self) -> usize {
        self.store.read().await.records.len()
    }

    fn is_evictable(&self, record: &CallRecord, now: DateTime<Utc>) -> bool {
        record.is_terminal() && now - record.created_at() > self.dedup_window
    }

    fn remove_entry(&self, store: &mut Store, fingerprint: &CallFingerprint) {
        if let Some(entry) = store.records.remove(fingerprint) {
            if let Some(call_id) = entry.record.provider_call_id() {
                store.by_call_id.remove(call_id);
            }
        }
    }
}

/// A lazy, finite sequence of state transitions ending at the record's
/// terminal state
///
/// Backed by a watch channel carrying the state history, with a cursor
/// per subscriber. Rapid transitions are never skipped: a subscriber
/// that wakes up late drains the intermediate states one by one before
/// reaching the terminal one.
pub struct StateSubscription {
    rx: watch::Receiver<Vec<CallState>>,
    cursor: usize,
    done: bool,
}

impl StateSubscription {
    /// Await the next observed state; `None` once the terminal state has
    /// been yielded (or the record was evicted)
    pub async fn next_state(&mut self) -> Option<CallState> {
        if self.done {
            return None;
        }
        loop {
            {
                let history = self.rx.borrow_and_update();
                if let Some(state) = history.get(self.cursor).copied() {
                    self.cursor += 1;
                    if state.is_terminal() {
                        self.done = true;
                    }
                    return Some(state);
                }
            }
            if self.rx.changed().await.is_err() {
                self.done = true;
                return None;
            }
        }
    }

    /// Await the terminal state directly
    pub async fn wait_terminal(&mut self) -> Result<CallState> {
        while let Some(state) = self.next_state().await {
            if state.is_terminal() {
                return Ok(state);
            }
        }
        Err(DomainError::NotFound("call record evicted".to_string()))
    }

    /// Point-in-time view of the current state
    pub fn current(&self) -> CallState {
        self.rx.borrow().last().copied().unwrap_or(CallState::Pending)
    }
}
