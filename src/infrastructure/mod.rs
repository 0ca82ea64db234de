//! Infrastructure layer - Technical implementations
//!
//! This layer contains:
//! - The Twilio adapter behind the telephony provider port
//! - Provider speech markup generation

pub mod provider;
