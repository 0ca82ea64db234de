//! API Router configuration

use super::calls_handler::{get_call, get_call_by_fingerprint, health_check, submit_call};
use super::status_handler::call_status;
use super::AppState;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the API router
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new().route("/health", get(health_check));

    let call_routes = Router::new()
        .route("/calls", post(submit_call))
        .route("/calls/:call_id", get(get_call))
        .route("/calls/fingerprint/:fingerprint", get(get_call_by_fingerprint));

    // The path registered with the provider as StatusCallback
    let webhook_routes = Router::new().route("/call-status", post(call_status));

    Router::new()
        .merge(health_routes)
        .merge(call_routes)
        .merge(webhook_routes)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
