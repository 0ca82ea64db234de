//! Call bounded context - outbound call requests, records and lifecycle

pub mod event;
pub mod provider;
pub mod record;
pub mod request;
pub mod value_object;

pub use event::LifecycleEvent;
pub use provider::{CallPayload, ProviderCall, ProviderError, TelephonyProvider};
pub use record::CallRecord;
pub use request::{validate, CallRequest, ValidRequest, ValidationError};
pub use value_object::CallState;
