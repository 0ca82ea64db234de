//! Telephony provider adapters

pub mod markup;
pub mod twilio;

pub use twilio::TwilioProvider;
