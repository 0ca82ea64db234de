//! Call record aggregate

use crate::domain::call::event::LifecycleEvent;
use crate::domain::call::value_object::CallState;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{CallFingerprint, ProviderCallId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One observed state transition with its timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub state: CallState,
    pub at: DateTime<Utc>,
}

/// Call record aggregate
///
/// Represents one outbound call attempt. Created on the first dispatch
/// attempt for a fingerprint, mutated only by the dispatcher (initial
/// state) and the status ingestor (subsequent states). A record in a
/// terminal state is immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    id: Uuid,
    fingerprint: CallFingerprint,
    provider_call_id: Option<ProviderCallId>,
    state: CallState,
    transitions: Vec<StateTransition>,
    last_error: Option<String>,
    attempts: u32,
    created_at: DateTime<Utc>,
}

impl CallRecord {
    /// Create a new record in `Pending` state
    pub fn new(fingerprint: CallFingerprint) -> Self {
        let created_at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            fingerprint,
            provider_call_id: None,
            state: CallState::Pending,
            transitions: vec![StateTransition {
                state: CallState::Pending,
                at: created_at,
            }],
            last_error: None,
            attempts: 0,
            created_at,
        }
    }

    /// Mark dispatch acceptance by the provider
    ///
    /// Only valid from `Pending`; stores the provider call id.
    pub fn mark_dispatched(&mut self, call_id: ProviderCallId) -> Result<()> {
        if self.state != CallState::Pending {
            return Err(DomainError::AlreadyDispatched(self.fingerprint.to_string()));
        }
        self.provider_call_id = Some(call_id);
        self.transition_to(CallState::Dispatched, Utc::now())
    }

    /// Count one dispatch attempt against the retry budget
    pub fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    /// Mark the record failed with an error detail
    pub fn mark_failed(&mut self, error: impl Into<String>) -> Result<()> {
        self.transition_to(CallState::Failed, Utc::now())?;
        self.last_error = Some(error.into());
        Ok(())
    }

    /// Apply a provider lifecycle event
    ///
    /// Returns `true` if the event advanced the state, `false` if it was
    /// a duplicate or out-of-order arrival and was ignored. Ignoring is
    /// what makes ingestion idempotent under at-least-once redelivery.
    pub fn apply_event(&mut self, event: LifecycleEvent, at: DateTime<Utc>) -> bool {
        let target = event.target_state();
        if !self.state.can_transition_to(&target) {
            return false;
        }
        if event == LifecycleEvent::Busy {
            self.last_error = Some("busy".to_string());
        }
        self.state = target;
        self.transitions.push(StateTransition { state: target, at });
        true
    }

    /// Expire a dispatched call that never reported a terminal event
    ///
    /// Returns `true` if the record transitioned; `false` if a terminal
    /// callback already won the race.
    pub fn time_out(&mut self) -> bool {
        if !self.state.can_transition_to(&CallState::TimedOut) {
            return false;
        }
        self.state = CallState::TimedOut;
        self.transitions.push(StateTransition {
            state: CallState::TimedOut,
            at: Utc::now(),
        });
        true
    }

    /// Transition to a new state
    fn transition_to(&mut self, new_state: CallState, at: DateTime<Utc>) -> Result<()> {
        if !self.state.can_transition_to(&new_state) {
            return Err(DomainError::InvalidStateTransition(format!(
                "Cannot transition from {:?} to {:?}",
                self.state, new_state
            )));
        }
        self.state = new_state;
        self.transitions.push(StateTransition {
            state: new_state,
            at,
        });
        Ok(())
    }

    // Getters
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn fingerprint(&self) -> &CallFingerprint {
        &self.fingerprint
    }

    pub fn provider_call_id(&self) -> Option<&ProviderCallId> {
        self.provider_call_id.as_ref()
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// When the record reached its terminal state, if it has
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.transitions
            .last()
            .filter(|t| t.state.is_terminal())
            .map(|t| t.at)
    }
}
