//! Twilio adapter for the telephony provider port

use crate::config::ProviderConfig;
use crate::domain::call::provider::{CallPayload, ProviderCall, ProviderError, TelephonyProvider};
use crate::domain::shared::value_objects::ProviderCallId;
use crate::infrastructure::provider::markup::say_markup;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

/// Response body for an accepted call-creation request
#[derive(Debug, Deserialize)]
struct TwilioCallResponse {
    sid: String,
    status: String,
}

/// Twilio error body, carrying a numeric error code
#[derive(Debug, Deserialize)]
struct TwilioErrorResponse {
    code: Option<i64>,
    message: Option<String>,
}

/// Places calls through the Twilio REST API
///
/// One call-creation request per dispatch: form-encoded POST to
/// `/2010-04-01/Accounts/{sid}/Calls.json` with the spoken message
/// wrapped in TwiML and the status callback registered for all
/// lifecycle events.
pub struct TwilioProvider {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    api_base_url: String,
    voice: String,
}

impl TwilioProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            client,
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            voice: config.voice.clone(),
        }
    }

    fn calls_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.api_base_url, self.account_sid
        )
    }
}

#[async_trait]
impl TelephonyProvider for TwilioProvider {
    async fn place_call(&self, payload: CallPayload) -> Result<ProviderCall, ProviderError> {
        let twiml = say_markup(&payload.spoken_message, &self.voice);
        let timeout = payload.ring_timeout_secs.to_string();
        let form: Vec<(&str, &str)> = vec![
            ("To", payload.to.as_str()),
            ("From", payload.from.as_str()),
            ("Twiml", &twiml),
            ("Timeout", &timeout),
            ("StatusCallback", &payload.status_callback_url),
            ("StatusCallbackEvent", "initiated"),
            ("StatusCallbackEvent", "ringing"),
            ("StatusCallbackEvent", "answered"),
            ("StatusCallbackEvent", "completed"),
        ];

        debug!(to = %payload.to, "submitting call-creation request");

        let response = self
            .client
            .post(self.calls_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let body: TwilioCallResponse = response
                .json()
                .await
                .map_err(|e| ProviderError::Rejected {
                    status: status.as_u16(),
                    message: format!("unreadable provider response: {}", e),
                })?;
            return Ok(ProviderCall {
                call_id: ProviderCallId::new(body.sid),
                initial_status: body.status,
            });
        }

        if let Some(err) = classify_http_failure(status.as_u16()) {
            return Err(err);
        }

        let body: TwilioErrorResponse = response.json().await.unwrap_or(TwilioErrorResponse {
            code: None,
            message: None,
        });
        let message = body.message.unwrap_or_else(|| status.to_string());
        error!(status = status.as_u16(), code = body.code, %message, "provider rejected call");
        Err(classify_rejection(status.as_u16(), body.code, message))
    }
}

/// Map retryable HTTP failures onto the structured taxonomy
///
/// 5xx and 429 are provider-side or rate-limit conditions worth another
/// attempt; everything else falls through to error-body classification.
fn classify_http_failure(status: u16) -> Option<ProviderError> {
    if (500..600).contains(&status) || status == 429 {
        Some(ProviderError::Transient(format!(
            "provider returned {}",
            status
        )))
    } else {
        None
    }
}

/// Map Twilio error codes onto the structured taxonomy
///
/// Codes instead of message substrings: 21211/21214/21217 are malformed
/// or undialable destination numbers, 21215/21216 are geo-permission
/// blocks, 20003/20005 are authentication or suspended-account errors.
fn classify_rejection(status: u16, code: Option<i64>, message: String) -> ProviderError {
    match code {
        Some(21211) | Some(21214) | Some(21217) => ProviderError::InvalidDestination(message),
        Some(21215) | Some(21216) => ProviderError::NumberBlocked(message),
        Some(20003) | Some(20005) => ProviderError::AccountSuspended(message),
        _ => ProviderError::Rejected { status, message },
    }
}
