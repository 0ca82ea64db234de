//! Configuration management
//!
//! All credentials and tuning knobs live in one immutable `Config`,
//! constructed once at startup from `dialout.toml` and `DIALOUT_*`
//! environment overrides, then passed down to the components that
//! need it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub dispatch: DispatchConfig,
    pub calls: CallPolicyConfig,
}

/// HTTP server for the status webhook and read-side API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Telephony provider credentials and endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Originating number shown to the callee, E.164
    pub from_number: String,
    pub api_base_url: String,
    /// Voice used for the provider's speech markup
    pub voice: String,
}

/// Retry policy for transient dispatch failures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Total attempts per record, first try included
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

/// Call lifecycle policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallPolicyConfig {
    /// Externally reachable base URL the provider posts callbacks to
    pub callback_base_url: String,
    /// How long the provider lets the call ring, in seconds
    pub ring_timeout_secs: u32,
    /// Grace period past the ring timeout before a dispatched call with
    /// no terminal callback is marked timed out
    pub watchdog_grace_secs: u64,
    /// How long identical requests resolve to one dispatched call
    pub dedup_window_secs: u64,
    /// How often terminal records past the window are swept out
    pub eviction_interval_secs: u64,
}

impl Config {
    /// Load configuration from `dialout.toml` (optional) with
    /// `DIALOUT_*` environment overrides, e.g.
    /// `DIALOUT_PROVIDER__ACCOUNT_SID`
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("dialout").required(false))
            .add_source(config::Environment::with_prefix("DIALOUT").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Full URL the provider should deliver status events to
    pub fn status_callback_url(&self) -> String {
        format!(
            "{}/call-status",
            self.calls.callback_base_url.trim_end_matches('/')
        )
    }

    /// Watchdog deadline, derived from the provider's own ring timeout
    pub fn watchdog_deadline(&self) -> Duration {
        Duration::from_secs(u64::from(self.calls.ring_timeout_secs) + self.calls.watchdog_grace_secs)
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.calls.dedup_window_secs)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.calls.eviction_interval_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            api_base_url: "https://api.twilio.com".to_string(),
            voice: "Polly.Joanna".to_string(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl Default for CallPolicyConfig {
    fn default() -> Self {
        Self {
            callback_base_url: "http://localhost:8080".to_string(),
            ring_timeout_secs: 30,
            watchdog_grace_secs: 60,
            dedup_window_secs: 3_600,
            eviction_interval_secs: 300,
        }
    }
}
