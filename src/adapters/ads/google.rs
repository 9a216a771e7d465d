//! Google Ads API adapter (REST `googleAds:search` with GAQL).

use super::{expiry_from, read_json, TokenResponse};
use crate::domain::insights::RawNumber;
use crate::domain::{
    AccountCredentials, Campaign, DateRange, DomainError, GoogleInsight, InsightBatch, Platform,
    RefreshedToken,
};
use crate::ports::{AdsGateway, ProviderSnapshot};
use chrono::Utc;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

pub const DEFAULT_ADS_URL: &str = "https://googleads.googleapis.com/v17";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Upper bound on followed result pages per query.
const MAX_PAGES: usize = 20;

const CAMPAIGN_QUERY: &str = "SELECT campaign.id, campaign.name, campaign.status \
     FROM campaign WHERE campaign.status != 'REMOVED'";

#[derive(Clone, Default)]
pub struct GoogleAdsSettings {
    pub base_url: String,
    pub token_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Used when the account's metadata carries no developer token.
    pub developer_token: Option<String>,
}

impl std::fmt::Debug for GoogleAdsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleAdsSettings")
            .field("base_url", &self.base_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("developer_token", &self.developer_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

pub struct GoogleAdsAdapter {
    client: Client,
    settings: GoogleAdsSettings,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPage<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct CampaignRow {
    campaign: GoogleCampaign,
}

#[derive(Deserialize)]
struct GoogleCampaign {
    #[serde(default)]
    id: RawNumber,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
}

impl GoogleAdsAdapter {
    pub fn new(client: Client, settings: GoogleAdsSettings) -> Self {
        Self { client, settings }
    }

    fn base(&self) -> &str {
        let base = self.settings.base_url.trim_end_matches('/');
        if base.is_empty() { DEFAULT_ADS_URL } else { base }
    }

    fn token_url(&self) -> &str {
        if self.settings.token_url.is_empty() {
            DEFAULT_TOKEN_URL
        } else {
            &self.settings.token_url
        }
    }

    fn developer_token<'a>(&'a self, credentials: &'a AccountCredentials) -> Result<&'a str, DomainError> {
        credentials
            .developer_token
            .as_deref()
            .or(self.settings.developer_token.as_deref())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DomainError::Provider("Google Ads developer token not configured".to_string()))
    }

    /// Run one GAQL query, following `nextPageToken`.
    async fn search<T: DeserializeOwned>(
        &self,
        credentials: &AccountCredentials,
        query: &str,
    ) -> Result<Vec<T>, DomainError> {
        let url = format!(
            "{}/customers/{}/googleAds:search",
            self.base(),
            customer_id(&credentials.external_account_id)
        );
        let developer_token = self.developer_token(credentials)?;
        let mut rows = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut body = serde_json::json!({ "query": query });
            if let Some(token) = &page_token {
                body["pageToken"] = serde_json::Value::String(token.clone());
            }
            let response = self
                .client
                .post(&url)
                .bearer_auth(&credentials.access_token)
                .header("developer-token", developer_token)
                .json(&body)
                .send()
                .await
                .map_err(|e| DomainError::Provider(format!("Google Ads request failed: {}", e)))?;
            let page: SearchPage<T> =
                read_json(response, "Google Ads search", DomainError::Provider).await?;
            rows.extend(page.results);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => return Ok(rows),
            }
        }
        Ok(rows)
    }
}

/// Google expects the customer id without dashes.
fn customer_id(external_id: &str) -> String {
    external_id.chars().filter(|c| *c != '-').collect()
}

fn metrics_query(range: &DateRange) -> String {
    format!(
        "SELECT metrics.impressions, metrics.clicks, metrics.cost_micros, metrics.conversions, \
         segments.date FROM customer WHERE segments.date BETWEEN '{}' AND '{}'",
        range.start.format("%Y-%m-%d"),
        range.end.format("%Y-%m-%d")
    )
}

#[async_trait::async_trait]
impl AdsGateway for GoogleAdsAdapter {
    fn platform(&self) -> Platform {
        Platform::Google
    }

    async fn fetch_snapshot(
        &self,
        credentials: &AccountCredentials,
        range: &DateRange,
    ) -> Result<ProviderSnapshot, DomainError> {
        debug!(customer = %credentials.external_account_id, "fetching Google Ads metrics");
        let insights: Vec<GoogleInsight> = self.search(credentials, &metrics_query(range)).await?;
        let campaigns: Vec<CampaignRow> = self.search(credentials, CAMPAIGN_QUERY).await?;
        let campaigns: Vec<Campaign> = campaigns
            .into_iter()
            .map(|row| Campaign {
                id: row.campaign.id.as_str().unwrap_or_default().to_string(),
                name: row.campaign.name,
                status: row.campaign.status,
            })
            .collect();
        info!(
            customer = %credentials.external_account_id,
            rows = insights.len(),
            campaigns = campaigns.len(),
            "Google Ads snapshot fetched"
        );
        Ok(ProviderSnapshot {
            insights: InsightBatch::Google(insights),
            campaigns,
        })
    }

    async fn refresh_token(
        &self,
        credentials: &AccountCredentials,
    ) -> Result<RefreshedToken, DomainError> {
        let Some(refresh_token) = credentials.refresh_token.as_deref() else {
            return Err(DomainError::CredentialRefresh(
                "no refresh token stored for account".to_string(),
            ));
        };
        let (Some(client_id), Some(client_secret)) = (
            self.settings.client_id.as_deref(),
            self.settings.client_secret.as_deref(),
        ) else {
            return Err(DomainError::CredentialRefresh(
                "Google OAuth client id/secret not configured".to_string(),
            ));
        };

        let response = self
            .client
            .post(self.token_url())
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| DomainError::CredentialRefresh(format!("Google token refresh failed: {}", e)))?;
        let token: TokenResponse =
            read_json(response, "Google token refresh", DomainError::CredentialRefresh).await?;

        Ok(RefreshedToken {
            expires_at: expiry_from(token.expires_in, Utc::now()),
            refresh_token: token.refresh_token,
            access_token: token.access_token,
        })
    }
}
