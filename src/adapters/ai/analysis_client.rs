//! HTTP client for the external analysis service.
//!
//! Posts the metrics snapshot, raw daily rows, campaigns and the rendered prompt to
//! `{base}/mcp/analyze` and reads back `{analysis: {summary, insights, recommendations}}`.
//! Any transport error, non-2xx status or malformed body is returned as
//! [`DomainError::Analysis`]; the caller decides whether to fall back.

use crate::domain::{AnalysisResult, Campaign, CanonicalMetrics, DateRange, DomainError, InsightBatch, Platform};
use crate::ports::{AiPort, AnalysisRequest};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

const ANALYZE_PATH: &str = "/mcp/analyze";

pub struct AnalysisClient {
    client: reqwest::Client,
    endpoint: String,
}

impl AnalysisClient {
    /// `base_url` is the service root, e.g. `http://localhost:8080`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Config(format!("analysis HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint_for(base_url),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn endpoint_for(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), ANALYZE_PATH)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeData<'a> {
    metrics: &'a CanonicalMetrics,
    insights: &'a InsightBatch,
    campaigns: &'a [Campaign],
    time_range: &'a DateRange,
}

#[derive(Serialize)]
struct AnalyzeBody<'a> {
    platform: Platform,
    data: AnalyzeData<'a>,
    prompt: &'a str,
}

impl<'a> From<&'a AnalysisRequest> for AnalyzeBody<'a> {
    fn from(request: &'a AnalysisRequest) -> Self {
        Self {
            platform: request.platform,
            data: AnalyzeData {
                metrics: &request.metrics,
                insights: &request.insights,
                campaigns: &request.campaigns,
                time_range: &request.time_range,
            },
            prompt: &request.prompt,
        }
    }
}

#[derive(Deserialize)]
struct AnalyzeResponse {
    analysis: ServiceAnalysis,
}

#[derive(Deserialize)]
struct ServiceAnalysis {
    summary: String,
    #[serde(default)]
    insights: Vec<String>,
    #[serde(default)]
    recommendations: Vec<String>,
}

fn parse_response(body: &str) -> Result<AnalysisResult, DomainError> {
    let parsed: AnalyzeResponse = serde_json::from_str(body)
        .map_err(|e| DomainError::Analysis(format!("malformed response: {}", e)))?;
    Ok(AnalysisResult {
        summary: parsed.analysis.summary,
        insights: parsed.analysis.insights,
        recommendations: parsed.analysis.recommendations,
    })
}

#[async_trait::async_trait]
impl AiPort for AnalysisClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, DomainError> {
        info!(
            platform = %request.platform,
            report_type = %request.report_type,
            rows = request.insights.len(),
            campaigns = request.campaigns.len(),
            "requesting analysis"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&AnalyzeBody::from(request))
            .send()
            .await
            .map_err(|e| DomainError::Analysis(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DomainError::Analysis(format!("reading response failed: {}", e)))?;

        if !status.is_success() {
            warn!(status = %status, "analysis service returned error");
            return Err(DomainError::Analysis(format!(
                "API error {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        debug!(body_len = text.len(), "received analysis response");
        let result = parse_response(&text)?;
        info!(
            insights = result.insights.len(),
            recommendations = result.recommendations.len(),
            "analysis complete"
        );
        Ok(result)
    }
}
