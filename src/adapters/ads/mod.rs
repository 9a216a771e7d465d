//! Ad platform adapters. Each implements `AdsGateway` for one platform.
//!
//! Adapters are stateless with respect to accounts: credentials arrive with every call.

pub mod google;
pub mod meta;

pub use google::{GoogleAdsAdapter, GoogleAdsSettings};
pub use meta::{MetaAdsAdapter, MetaAdsSettings};

use crate::domain::DomainError;
use chrono::{DateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// OAuth token endpoint response shared by both platforms.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

pub(crate) fn expiry_from(expires_in: Option<i64>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    expires_in
        .filter(|secs| *secs > 0)
        .map(|secs| now + TimeDelta::seconds(secs))
}

/// Check status and decode a JSON body, mapping failures through `err`.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
    err: fn(String) -> DomainError,
) -> Result<T, DomainError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| err(format!("{}: reading body failed: {}", what, e)))?;
    if !status.is_success() {
        return Err(err(format!(
            "{} returned {}: {}",
            what,
            status,
            text.chars().take(300).collect::<String>()
        )));
    }
    serde_json::from_str(&text).map_err(|e| err(format!("{}: malformed response: {}", what, e)))
}
