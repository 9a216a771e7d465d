//! Application configuration. Bind address, storage, provider credentials, timeouts.
//!
//! Read from `ADREPORT_*` environment variables (and `.env`), plus an optional file
//! named by `ADREPORT_CONFIG`. A few well-known unprefixed variables are honoured too.

use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_ANALYSIS_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
/// JST. Schedules fire at 09:00 in this offset.
pub const DEFAULT_SCHEDULE_UTC_OFFSET_MINUTES: i32 = 540;

#[derive(Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Bearer key for the batch trigger. Read from ADREPORT_INTERNAL_API_KEY or INTERNAL_API_KEY.
    #[serde(default)]
    pub internal_api_key: Option<String>,

    /// HS256 secret for session tokens. Read from ADREPORT_JWT_SECRET or JWT_SECRET.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Analysis service root. Unset means rule-based analysis only.
    #[serde(default)]
    pub analysis_api_url: Option<String>,
    #[serde(default)]
    pub analysis_timeout_secs: Option<u64>,

    /// Timeout for provider and chat API calls.
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,

    /// Run the batch in-process every N seconds. Unset or 0 disables the ticker.
    #[serde(default)]
    pub scheduler_interval_secs: Option<u64>,

    #[serde(default)]
    pub schedule_utc_offset_minutes: Option<i32>,

    // ─────────────────────────────────────────────────────────────────────────
    // Ad platforms
    // ─────────────────────────────────────────────────────────────────────────
    #[serde(default)]
    pub meta_app_id: Option<String>,
    #[serde(default)]
    pub meta_app_secret: Option<String>,
    #[serde(default)]
    pub meta_api_url: Option<String>,

    #[serde(default)]
    pub google_client_id: Option<String>,
    #[serde(default)]
    pub google_client_secret: Option<String>,
    /// Fallback when an account's metadata has no developer token.
    #[serde(default)]
    pub google_developer_token: Option<String>,
    #[serde(default)]
    pub google_ads_api_url: Option<String>,
    #[serde(default)]
    pub google_token_url: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // Chat delivery
    // ─────────────────────────────────────────────────────────────────────────
    #[serde(default)]
    pub chatwork_api_url: Option<String>,
}

fn redact(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "[REDACTED]")
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("data_dir", &self.data_dir)
            .field("internal_api_key", &redact(&self.internal_api_key))
            .field("jwt_secret", &redact(&self.jwt_secret))
            .field("analysis_api_url", &self.analysis_api_url)
            .field("scheduler_interval_secs", &self.scheduler_interval_secs)
            .field("schedule_utc_offset_minutes", &self.schedule_utc_offset_minutes)
            .field("meta_app_id", &self.meta_app_id)
            .field("meta_app_secret", &redact(&self.meta_app_secret))
            .field("google_client_id", &self.google_client_id)
            .field("google_client_secret", &redact(&self.google_client_secret))
            .field("google_developer_token", &redact(&self.google_developer_token))
            .finish_non_exhaustive()
    }
}

/// First non-blank of the configured value and the unprefixed env variable.
fn with_env_fallback(value: &Option<String>, env_key: &str) -> Option<String> {
    value
        .clone()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| std::env::var(env_key).ok().filter(|v| !v.trim().is_empty()))
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix("ADREPORT").try_parsing(true));
        if let Ok(path) = std::env::var("ADREPORT_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        let mut cfg: Self = c.build()?.try_deserialize()?;
        // PORT is read directly so platform-provided ports work without the prefix.
        if cfg.port.is_none() {
            if let Ok(s) = std::env::var("PORT") {
                if let Ok(port) = s.parse::<u16>() {
                    cfg.port = Some(port);
                }
            }
        }
        Ok(cfg)
    }

    /// `host:port`. Defaults to 127.0.0.1:3000.
    pub fn bind_addr_or_default(&self) -> String {
        format!(
            "{}:{}",
            self.host.as_deref().unwrap_or(DEFAULT_HOST),
            self.port.unwrap_or(DEFAULT_PORT)
        )
    }

    pub fn data_dir_or_default(&self) -> PathBuf {
        PathBuf::from(self.data_dir.as_deref().unwrap_or(DEFAULT_DATA_DIR))
    }

    pub fn internal_api_key(&self) -> Option<String> {
        with_env_fallback(&self.internal_api_key, "INTERNAL_API_KEY")
    }

    pub fn jwt_secret(&self) -> Option<String> {
        with_env_fallback(&self.jwt_secret, "JWT_SECRET")
    }

    pub fn analysis_api_url(&self) -> Option<String> {
        with_env_fallback(&self.analysis_api_url, "ANALYSIS_API_URL")
    }

    pub fn analysis_timeout_or_default(&self) -> Duration {
        Duration::from_secs(
            self.analysis_timeout_secs
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_ANALYSIS_TIMEOUT_SECS),
        )
    }

    pub fn http_timeout_or_default(&self) -> Duration {
        Duration::from_secs(
            self.http_timeout_secs
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        )
    }

    /// `None` when the in-process ticker is disabled.
    pub fn scheduler_interval(&self) -> Option<Duration> {
        self.scheduler_interval_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    /// Offset for schedule run times. Out-of-range values fall back to the default.
    pub fn schedule_offset_or_default(&self) -> FixedOffset {
        let minutes = self
            .schedule_utc_offset_minutes
            .unwrap_or(DEFAULT_SCHEDULE_UTC_OFFSET_MINUTES);
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .or_else(|| FixedOffset::east_opt(DEFAULT_SCHEDULE_UTC_OFFSET_MINUTES * 60))
            .unwrap_or_else(|| Utc.fix())
    }

    pub fn meta_app_id(&self) -> Option<String> {
        with_env_fallback(&self.meta_app_id, "META_APP_ID")
    }

    pub fn meta_app_secret(&self) -> Option<String> {
        with_env_fallback(&self.meta_app_secret, "META_APP_SECRET")
    }

    pub fn google_client_id(&self) -> Option<String> {
        with_env_fallback(&self.google_client_id, "GOOGLE_CLIENT_ID")
    }

    pub fn google_client_secret(&self) -> Option<String> {
        with_env_fallback(&self.google_client_secret, "GOOGLE_CLIENT_SECRET")
    }

    pub fn google_developer_token(&self) -> Option<String> {
        with_env_fallback(&self.google_developer_token, "GOOGLE_DEVELOPER_TOKEN")
    }
}
