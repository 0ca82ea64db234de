//! Domain layer - Core business logic and rules
//!
//! This layer contains:
//! - The call bounded context: requests, records, lifecycle events
//! - The idempotency ledger and call registry
//! - The dispatcher and status ingestor services
//! - The telephony provider port

pub mod call;
pub mod dispatcher;
pub mod ingestor;
pub mod ledger;
pub mod registry;
pub mod shared;

// Re-export commonly used types
pub use shared::{DomainError, Result};
