//! Meta Marketing (Graph) API adapter.

use super::{expiry_from, read_json, TokenResponse};
use crate::domain::{
    AccountCredentials, Campaign, DateRange, DomainError, InsightBatch, MetaInsight, Platform,
    RefreshedToken,
};
use crate::ports::{AdsGateway, ProviderSnapshot};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

pub const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com/v21.0";

const INSIGHT_FIELDS: &str = "impressions,clicks,spend,cpm,cpc,ctr,conversions,cost_per_conversion";
const CAMPAIGN_FIELDS: &str = "id,name,status";

/// App-level settings; the per-account token travels in [`AccountCredentials`].
#[derive(Clone, Default)]
pub struct MetaAdsSettings {
    pub base_url: String,
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
}

impl std::fmt::Debug for MetaAdsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaAdsSettings")
            .field("base_url", &self.base_url)
            .field("app_id", &self.app_id)
            .field("app_secret", &self.app_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

pub struct MetaAdsAdapter {
    client: Client,
    settings: MetaAdsSettings,
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Deserialize)]
struct GraphCampaign {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
}

impl MetaAdsAdapter {
    pub fn new(client: Client, settings: MetaAdsSettings) -> Self {
        Self { client, settings }
    }

    fn base(&self) -> &str {
        let base = self.settings.base_url.trim_end_matches('/');
        if base.is_empty() { DEFAULT_GRAPH_URL } else { base }
    }

    async fn insights(
        &self,
        credentials: &AccountCredentials,
        range: &DateRange,
    ) -> Result<Vec<MetaInsight>, DomainError> {
        let url = format!("{}/{}/insights", self.base(), ad_account_path(&credentials.external_account_id));
        let time_range = time_range_param(range);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("access_token", credentials.access_token.as_str()),
                ("fields", INSIGHT_FIELDS),
                ("time_range", time_range.as_str()),
                ("time_increment", "1"),
                ("level", "account"),
            ])
            .send()
            .await
            .map_err(|e| DomainError::Provider(format!("Meta insights request failed: {}", e)))?;
        let page: Page<MetaInsight> =
            read_json(response, "Meta insights", DomainError::Provider).await?;
        Ok(page.data)
    }

    async fn campaigns(&self, credentials: &AccountCredentials) -> Result<Vec<Campaign>, DomainError> {
        let url = format!("{}/{}/campaigns", self.base(), ad_account_path(&credentials.external_account_id));
        let response = self
            .client
            .get(&url)
            .query(&[
                ("access_token", credentials.access_token.as_str()),
                ("fields", CAMPAIGN_FIELDS),
            ])
            .send()
            .await
            .map_err(|e| DomainError::Provider(format!("Meta campaigns request failed: {}", e)))?;
        let page: Page<GraphCampaign> =
            read_json(response, "Meta campaigns", DomainError::Provider).await?;
        Ok(page
            .data
            .into_iter()
            .map(|c| Campaign {
                id: c.id,
                name: c.name,
                status: c.status,
            })
            .collect())
    }
}

/// Graph API addresses ad accounts as `act_<id>`.
fn ad_account_path(external_id: &str) -> String {
    if external_id.starts_with("act_") {
        external_id.to_string()
    } else {
        format!("act_{}", external_id)
    }
}

fn time_range_param(range: &DateRange) -> String {
    serde_json::json!({
        "since": range.start.format("%Y-%m-%d").to_string(),
        "until": range.end.format("%Y-%m-%d").to_string(),
    })
    .to_string()
}

#[async_trait::async_trait]
impl AdsGateway for MetaAdsAdapter {
    fn platform(&self) -> Platform {
        Platform::Meta
    }

    async fn fetch_snapshot(
        &self,
        credentials: &AccountCredentials,
        range: &DateRange,
    ) -> Result<ProviderSnapshot, DomainError> {
        debug!(account = %credentials.external_account_id, "fetching Meta insights");
        let insights = self.insights(credentials, range).await?;
        let campaigns = self.campaigns(credentials).await?;
        info!(
            account = %credentials.external_account_id,
            rows = insights.len(),
            campaigns = campaigns.len(),
            "Meta snapshot fetched"
        );
        Ok(ProviderSnapshot {
            insights: InsightBatch::Meta(insights),
            campaigns,
        })
    }

    /// Exchange the current token for a fresh long-lived one.
    async fn refresh_token(
        &self,
        credentials: &AccountCredentials,
    ) -> Result<RefreshedToken, DomainError> {
        let (Some(app_id), Some(app_secret)) =
            (self.settings.app_id.as_deref(), self.settings.app_secret.as_deref())
        else {
            return Err(DomainError::CredentialRefresh(
                "Meta app id/secret not configured".to_string(),
            ));
        };
        let exchange = credentials
            .refresh_token
            .as_deref()
            .unwrap_or(credentials.access_token.as_str());

        let response = self
            .client
            .get(format!("{}/oauth/access_token", self.base()))
            .query(&[
                ("grant_type", "fb_exchange_token"),
                ("client_id", app_id),
                ("client_secret", app_secret),
                ("fb_exchange_token", exchange),
            ])
            .send()
            .await
            .map_err(|e| DomainError::CredentialRefresh(format!("Meta token exchange failed: {}", e)))?;
        let token: TokenResponse =
            read_json(response, "Meta token exchange", DomainError::CredentialRefresh).await?;

        Ok(RefreshedToken {
            expires_at: expiry_from(token.expires_in, Utc::now()),
            refresh_token: token.refresh_token,
            access_token: token.access_token,
        })
    }
}
