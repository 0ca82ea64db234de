//! REST API - status webhook and read-side endpoints

pub mod calls_handler;
pub mod router;
pub mod status_handler;

use crate::application::CallService;
use crate::domain::ingestor::StatusIngestor;
use crate::domain::registry::CallRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use router::build_router;

/// Shared state for all API handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CallService>,
    pub ingestor: Arc<StatusIngestor>,
    pub registry: Arc<CallRegistry>,
}

/// Uniform response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}
