use std::time::Duration;

use serde::Deserialize;

use crate::services::workbench::WorkbenchSettings;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Bind address for the client API (e.g., "127.0.0.1:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Redis connection string for the profile store. Unset keeps profiles in memory.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Gemini API key. Unset means every gateway call degrades to its sentinel.
    #[serde(default)]
    pub gemini_api_key: String,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// HS256 secret for session tokens
    pub session_secret: String,

    /// AES-256-GCM key for profile blobs (base64-encoded, 32 bytes)
    #[serde(default)]
    pub profile_encryption_key: Option<String>,

    /// Simulated remote sync before a payout commits
    #[serde(default = "default_settlement_delay_ms")]
    pub settlement_delay_ms: u64,

    /// Idle time before the wellness reminder
    #[serde(default = "default_wellness_idle_secs")]
    pub wellness_idle_secs: u64,

    /// JSON listing of missions; the built-in seed is used when unset
    #[serde(default)]
    pub jobs_file: Option<String>,

    #[serde(default = "default_currency")]
    pub currency: String,

    /// Relying party id for passkey ceremonies
    #[serde(default = "default_passkey_rp_id")]
    pub passkey_rp_id: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_gemini_model() -> String {
    "gemini-3-flash-preview".to_string()
}

fn default_settlement_delay_ms() -> u64 {
    2_000
}

fn default_wellness_idle_secs() -> u64 {
    20 * 60
}

fn default_currency() -> String {
    "BDT".to_string()
}

fn default_passkey_rp_id() -> String {
    "localhost".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn workbench_settings(&self) -> WorkbenchSettings {
        WorkbenchSettings {
            settlement_delay: Duration::from_millis(self.settlement_delay_ms),
            wellness_idle: Duration::from_secs(self.wellness_idle_secs),
            currency: self.currency.clone(),
        }
    }
}
