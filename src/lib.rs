//! Dialout - outbound call dispatch and status tracking
//!
//! Places confirmation phone calls on behalf of conversational agents:
//! at most one real call per logical request, with the asynchronous
//! call lifecycle reconciled back into a queryable record store.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interface;

// Re-export commonly used types
pub use domain::shared::error::DomainError;
pub use domain::shared::result::Result;
