//! Telephony provider port

use crate::domain::shared::value_objects::{PhoneNumber, ProviderCallId};
use async_trait::async_trait;
use thiserror::Error;

/// Payload for one provider call-creation request
#[derive(Debug, Clone)]
pub struct CallPayload {
    /// Callee number
    pub to: PhoneNumber,
    /// Originating number, from configuration
    pub from: PhoneNumber,
    /// Plain text to speak; the adapter wraps it in provider markup
    pub spoken_message: String,
    /// Where the provider should deliver lifecycle callbacks
    pub status_callback_url: String,
    /// How long the provider lets the call ring, in seconds
    pub ring_timeout_secs: u32,
}

/// Provider acceptance of a call-creation request
#[derive(Debug, Clone)]
pub struct ProviderCall {
    pub call_id: ProviderCallId,
    /// Initial status string as reported by the provider
    pub initial_status: String,
}

/// Structured provider error taxonomy
///
/// Replaces string matching on provider error messages: the adapter
/// classifies each failure into exactly one variant, and only
/// [`ProviderError::is_transient`] decides retry eligibility.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("provider rejected destination number: {0}")]
    InvalidDestination(String),

    #[error("calls to this number are not allowed: {0}")]
    NumberBlocked(String),

    #[error("account cannot place calls: {0}")]
    AccountSuspended(String),

    #[error("provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("transient provider failure: {0}")]
    Transient(String),
}

impl ProviderError {
    /// Transient failures are eligible for bounded retry; everything
    /// else is permanent and goes straight to `Failed`.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }
}

/// Port to the external telephony service
///
/// Defined in the domain layer as a trait, implemented in the
/// infrastructure layer against the provider's REST API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelephonyProvider: Send + Sync {
    /// Place a real outbound call; returns the provider-assigned call id
    async fn place_call(&self, payload: CallPayload) -> Result<ProviderCall, ProviderError>;
}
