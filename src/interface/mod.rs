//! Interface layer - External interfaces
//!
//! This layer handles:
//! - The provider status callback webhook
//! - REST endpoints for submitting and reading calls

pub mod api;
