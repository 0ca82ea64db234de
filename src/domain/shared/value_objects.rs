//! Shared value objects used across multiple bounded contexts

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Destination or origin phone number in E.164 form
///
/// Stored pre-normalized: a leading `+` followed by 8 to 15 digits,
/// with any visual separators (spaces, hyphens, dots, parentheses)
/// already stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Parse and normalize an E.164 phone number
    pub fn parse(raw: &str) -> Result<Self, String> {
        let normalized: String = raw
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
            .collect();

        let digits = match normalized.strip_prefix('+') {
            Some(rest) => rest,
            None => return Err("number must start with '+'".to_string()),
        };

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err("number must contain digits only after '+'".to_string());
        }

        if !(8..=15).contains(&digits.len()) {
            return Err(format!(
                "number must have 8 to 15 digits, got {}",
                digits.len()
            ));
        }

        if digits.starts_with('0') {
            return Err("country code cannot start with 0".to_string());
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the owning conversation/thread
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Provider-assigned call identifier (e.g. a Twilio call SID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderCallId(String);

impl ProviderCallId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderCallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic key identifying a logical call request for deduplication
///
/// Two requests with the same correlation id, normalized destination and
/// message text produce the same fingerprint and must resolve to the same
/// call record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallFingerprint(String);

impl CallFingerprint {
    /// Compute the fingerprint for a logical call request
    pub fn compute(correlation_id: &CorrelationId, destination: &PhoneNumber, message: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(correlation_id.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(destination.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(message.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Reconstruct a fingerprint from its hex form, e.g. from an API path
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
