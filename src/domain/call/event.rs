//! Provider lifecycle events

use crate::domain::call::value_object::CallState;
use serde::{Deserialize, Serialize};

/// Lifecycle event delivered by the telephony provider's status callback
///
/// Delivery is at-least-once and possibly out of order; the ingestor
/// relies on [`CallState::precedence`] to discard duplicates and
/// late arrivals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleEvent {
    Initiated,
    Ringing,
    Answered,
    Completed,
    Failed,
    NoAnswer,
    Busy,
}

impl LifecycleEvent {
    /// Map a provider status string onto a lifecycle event
    ///
    /// Covers the Twilio call status vocabulary; unknown strings are a
    /// malformed callback and yield `None`.
    pub fn from_provider_status(status: &str) -> Option<Self> {
        match status {
            "queued" | "initiated" => Some(LifecycleEvent::Initiated),
            "ringing" => Some(LifecycleEvent::Ringing),
            "answered" | "in-progress" => Some(LifecycleEvent::Answered),
            "completed" => Some(LifecycleEvent::Completed),
            "busy" => Some(LifecycleEvent::Busy),
            "no-answer" => Some(LifecycleEvent::NoAnswer),
            "failed" | "canceled" => Some(LifecycleEvent::Failed),
            _ => None,
        }
    }

    /// The record state this event drives the call toward
    pub fn target_state(&self) -> CallState {
        match self {
            LifecycleEvent::Initiated => CallState::Dispatched,
            LifecycleEvent::Ringing => CallState::Ringing,
            LifecycleEvent::Answered => CallState::Answered,
            LifecycleEvent::Completed => CallState::Completed,
            LifecycleEvent::Failed => CallState::Failed,
            // Busy is reported distinctly by the provider but means the
            // same outcome for the conversation: nobody picked up.
            LifecycleEvent::NoAnswer | LifecycleEvent::Busy => CallState::NoAnswer,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.target_state().is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::Initiated => "initiated",
            LifecycleEvent::Ringing => "ringing",
            LifecycleEvent::Answered => "answered",
            LifecycleEvent::Completed => "completed",
            LifecycleEvent::Failed => "failed",
            LifecycleEvent::NoAnswer => "no-answer",
            LifecycleEvent::Busy => "busy",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_status_mapping() {
        assert_eq!(
            LifecycleEvent::from_provider_status("ringing"),
            Some(LifecycleEvent::Ringing)
        );
        assert_eq!(
            LifecycleEvent::from_provider_status("in-progress"),
            Some(LifecycleEvent::Answered)
        );
        assert_eq!(
            LifecycleEvent::from_provider_status("canceled"),
            Some(LifecycleEvent::Failed)
        );
        assert_eq!(LifecycleEvent::from_provider_status("garbled"), None);
    }

    #[test]
    fn test_target_states() {
        assert_eq!(LifecycleEvent::Initiated.target_state(), CallState::Dispatched);
        assert_eq!(LifecycleEvent::Busy.target_state(), CallState::NoAnswer);
        assert!(LifecycleEvent::Completed.is_terminal());
        assert!(!LifecycleEvent::Ringing.is_terminal());
    }
}
