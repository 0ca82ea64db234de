//! Provider status callback webhook

use super::{ApiResponse, AppState};
use crate::domain::ingestor::{IngestOutcome, RejectReason};
use crate::domain::shared::value_objects::ProviderCallId;
use axum::extract::{Form, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

/// Form payload the provider posts for each lifecycle event
///
/// Every field is optional at the wire level so an incomplete body
/// still reaches the handler and gets acknowledged instead of bouncing
/// with a 4xx the provider would retry.
#[derive(Debug, Deserialize)]
pub struct StatusCallbackForm {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "CallStatus")]
    pub call_status: Option<String>,
    #[serde(rename = "Timestamp")]
    pub timestamp: Option<String>,
}

/// Receive one status callback
///
/// Always answers 200: the provider retries non-2xx deliveries on its
/// own, and rejected callbacks must not cause redelivery storms. The
/// envelope still reports what happened for anyone watching the logs
/// or probing by hand.
pub async fn call_status(
    State(state): State<AppState>,
    Form(form): Form<StatusCallbackForm>,
) -> Json<ApiResponse<String>> {
    let (call_sid, call_status) = match (form.call_sid, form.call_status) {
        (Some(sid), Some(status)) => (sid, status),
        (sid, status) => {
            warn!(?sid, ?status, "malformed status callback, missing CallSid or CallStatus");
            return Json(ApiResponse::error(
                "malformed callback: CallSid and CallStatus are required".to_string(),
            ));
        }
    };

    let at = form
        .timestamp
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc2822(raw).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    info!(call_sid = %call_sid, status = %call_status, "status callback received");

    let call_id = ProviderCallId::new(call_sid);
    match state.ingestor.ingest(&call_id, &call_status, at).await {
        IngestOutcome::Applied(record) => {
            Json(ApiResponse::success(record.state().as_str().to_string()))
        }
        IngestOutcome::Ignored(record) => {
            Json(ApiResponse::success(record.state().as_str().to_string()))
        }
        IngestOutcome::Rejected(RejectReason::UnknownCallId) => {
            Json(ApiResponse::error(format!("unknown call id {}", call_id)))
        }
        IngestOutcome::Rejected(RejectReason::MalformedEvent(status)) => {
            Json(ApiResponse::error(format!("unknown call status {}", status)))
        }
    }
}
