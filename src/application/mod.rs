//! Application layer - Use cases and application services
//!
//! Orchestrates the domain objects to fulfill the submit-call use case:
//! validate, reserve, dispatch, arm the watchdog, hand back a handle.

pub mod call_service;

pub use call_service::{CallHandle, CallService};
