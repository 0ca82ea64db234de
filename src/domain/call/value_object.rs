//! Call value objects

use serde::{Deserialize, Serialize};

/// Lifecycle state of an outbound call attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    /// Validated and reserved, not yet handed to the provider
    Pending,
    /// Provider accepted the call, call id known
    Dispatched,
    /// Callee is being alerted
    Ringing,
    /// Callee picked up
    Answered,
    /// Call finished normally (terminal)
    Completed,
    /// Provider or dispatch error (terminal)
    Failed,
    /// Callee did not pick up, or line was busy (terminal)
    NoAnswer,
    /// No terminal callback arrived within the deadline (terminal)
    TimedOut,
}

impl CallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Pending => "pending",
            CallState::Dispatched => "dispatched",
            CallState::Ringing => "ringing",
            CallState::Answered => "answered",
            CallState::Completed => "completed",
            CallState::Failed => "failed",
            CallState::NoAnswer => "no_answer",
            CallState::TimedOut => "timed_out",
        }
    }

    /// Terminal states admit no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallState::Completed | CallState::Failed | CallState::NoAnswer | CallState::TimedOut
        )
    }

    /// Canonical ordering used to discard out-of-order callbacks:
    /// `Pending < Dispatched < Ringing < Answered < terminal`
    pub fn precedence(&self) -> u8 {
        match self {
            CallState::Pending => 0,
            CallState::Dispatched => 1,
            CallState::Ringing => 2,
            CallState::Answered => 3,
            CallState::Completed | CallState::Failed | CallState::NoAnswer | CallState::TimedOut => 4,
        }
    }

    /// Check if state transition is valid
    ///
    /// Transitions only move forward in precedence; a terminal state
    /// accepts nothing.
    pub fn can_transition_to(&self, new_state: &CallState) -> bool {
        !self.is_terminal() && new_state.precedence() > self.precedence()
    }
}
