//! Call request validation

use crate::domain::shared::value_objects::{CallFingerprint, CorrelationId, PhoneNumber};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provider-imposed speech-synthesis limit on the spoken message
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// A request to place one outbound confirmation call
///
/// Submitted by conversation logic; immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRequest {
    /// Destination phone number, E.164
    pub destination: String,
    /// Text to be spoken to the callee
    pub message: String,
    /// Optional free-form instructions appended to the message
    pub instructions: Option<String>,
    /// Identifies the owning conversation/thread
    pub correlation_id: String,
}

/// Validation failures, surfaced synchronously before any side effect
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid destination number: {0}")]
    InvalidDestination(String),

    #[error("message is empty")]
    EmptyMessage,

    #[error("message exceeds {MAX_MESSAGE_CHARS} characters ({0})")]
    MessageTooLong(usize),

    #[error("correlation id is missing")]
    MissingCorrelationId,
}

/// A request that passed validation
///
/// Carries the normalized destination and the precomputed fingerprint,
/// so downstream components never re-derive either.
#[derive(Debug, Clone)]
pub struct ValidRequest {
    destination: PhoneNumber,
    message: String,
    instructions: Option<String>,
    correlation_id: CorrelationId,
    fingerprint: CallFingerprint,
}

/// Validate a call request
///
/// Pure function of its input; no network, no side effects.
pub fn validate(request: &CallRequest) -> Result<ValidRequest, ValidationError> {
    let destination = PhoneNumber::parse(&request.destination)
        .map_err(ValidationError::InvalidDestination)?;

    let message = request.message.trim();
    if message.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ValidationError::MessageTooLong(message.chars().count()));
    }

    let correlation_id = CorrelationId::new(request.correlation_id.clone());
    if correlation_id.is_empty() {
        return Err(ValidationError::MissingCorrelationId);
    }

    let fingerprint = CallFingerprint::compute(&correlation_id, &destination, message);

    Ok(ValidRequest {
        destination,
        message: message.to_string(),
        instructions: request
            .instructions
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from),
        correlation_id,
        fingerprint,
    })
}

impl ValidRequest {
    pub fn destination(&self) -> &PhoneNumber {
        &self.destination
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn fingerprint(&self) -> &CallFingerprint {
        &self.fingerprint
    }

    /// The full text to speak: the message, plus any instructions
    pub fn spoken_message(&self) -> String {
        match &self.instructions {
            Some(instructions) => {
                format!("{} Additional instructions: {}", self.message, instructions)
            }
            None => self.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(destination: &str, message: &str, correlation_id: &str) -> CallRequest {
        CallRequest {
            destination: destination.to_string(),
            message: message.to_string(),
            instructions: None,
            correlation_id: correlation_id.to_string(),
        }
    }

    #[test]
    fn test_valid_request() {
        let valid = validate(&request(
            "+14155551234",
            "Your appointment is confirmed.",
            "thread-42",
        ))
        .unwrap();

        assert_eq!(valid.destination().as_str(), "+14155551234");
        assert_eq!(valid.correlation_id().as_str(), "thread-42");
    }

    #[test]
    fn test_invalid_destination() {
        let result = validate(&request("5551234", "hello", "thread-42"));
        assert!(matches!(result, Err(ValidationError::InvalidDestination(_))));
    }

    #[test]
    fn test_empty_message() {
        let result = validate(&request("+14155551234", "   ", "thread-42"));
        assert_eq!(result.unwrap_err(), ValidationError::EmptyMessage);
    }

    #[test]
    fn test_message_too_long() {
        let long = "a".repeat(MAX_MESSAGE_CHARS + 1);
        let result = validate(&request("+14155551234", &long, "thread-42"));
        assert!(matches!(result, Err(ValidationError::MessageTooLong(_))));
    }

    #[test]
    fn test_missing_correlation_id() {
        let result = validate(&request("+14155551234", "hello", "  "));
        assert_eq!(result.unwrap_err(), ValidationError::MissingCorrelationId);
    }

    #[test]
    fn test_spoken_message_appends_instructions() {
        let mut req = request("+14155551234", "Your appointment is confirmed.", "thread-42");
        req.instructions = Some("Please bring your ID.".to_string());
        let valid = validate(&req).unwrap();

        assert_eq!(
            valid.spoken_message(),
            "Your appointment is confirmed. Additional instructions: Please bring your ID."
        );
    }

    #[test]
    fn test_same_logical_request_same_fingerprint() {
        let a = validate(&request("+14155551234", "hi there", "thread-42")).unwrap();
        let b = validate(&request("+1 415 555 1234", "hi there", "thread-42")).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
