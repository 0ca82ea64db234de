//! Call submission and read-side handlers

use super::{ApiResponse, AppState};
use crate::domain::call::record::CallRecord;
use crate::domain::call::request::CallRequest;
use crate::domain::shared::value_objects::{CallFingerprint, ProviderCallId};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

/// Submit a call request
///
/// Validation errors come back synchronously as 400; otherwise the
/// current record snapshot is returned, whether the request dispatched
/// a new call or deduplicated onto an existing one.
pub async fn submit_call(
    State(state): State<AppState>,
    Json(request): Json<CallRequest>,
) -> (StatusCode, Json<ApiResponse<CallRecord>>) {
    info!(
        correlation_id = %request.correlation_id,
        destination = %request.destination,
        "API: call request submitted"
    );

    match state.service.submit(&request).await {
        Ok(handle) => match handle.snapshot().await {
            Some(record) => (StatusCode::OK, Json(ApiResponse::success(record))),
            None => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("call record vanished".to_string())),
            ),
        },
        Err(e) => (StatusCode::BAD_REQUEST, Json(ApiResponse::error(e.to_string()))),
    }
}

/// Get a call record by provider call id
pub async fn get_call(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> (StatusCode, Json<ApiResponse<CallRecord>>) {
    let call_id = ProviderCallId::new(call_id);
    match state.registry.get_by_call_id(&call_id).await {
        Some(record) => (StatusCode::OK, Json(ApiResponse::success(record))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("call {} not found", call_id))),
        ),
    }
}

/// Get a call record by fingerprint
///
/// The fingerprint comes back in every submit response, so a
/// conversation can poll its call without storing the provider id.
pub async fn get_call_by_fingerprint(
    State(state): State<AppState>,
    Path(fingerprint): Path<String>,
) -> (StatusCode, Json<ApiResponse<CallRecord>>) {
    let fingerprint = CallFingerprint::from_hex(fingerprint);
    match state.registry.get(&fingerprint).await {
        Some(record) => (StatusCode::OK, Json(ApiResponse::success(record))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("no call for this fingerprint".to_string())),
        ),
    }
}

/// Liveness probe
pub async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse::success("ok".to_string()))
}
