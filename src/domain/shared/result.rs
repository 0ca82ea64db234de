//! Re-export of the domain result type

pub use super::error::Result;
