//! Analysis invoker. Builds the prompt, calls the analysis service, falls back to rules.
//!
//! The external call is bounded by a timeout. Timeout, transport failure, non-2xx and
//! malformed responses all resolve to the rule-based result, so `analyze` never fails.

use crate::adapters::ai::csv_utils::daily_breakdown_csv;
use crate::adapters::ai::RuleBasedAnalyzer;
use crate::domain::metrics::aggregate;
use crate::domain::{AnalysisResult, DateRange, Frequency, Platform};
use crate::ports::{AiPort, AnalysisRequest, ProviderSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Prompt templates keyed by (report frequency, platform).
const PROMPTS: [(Frequency, Platform, &str); 4] = [
    (
        Frequency::Weekly,
        Platform::Meta,
        "Analyze this week's Meta (Facebook/Instagram) advertising performance. \
         Evaluate CTR, CPC and cost per conversion, point out notable movements in the daily \
         trend, and suggest concrete creative and audience changes for next week.",
    ),
    (
        Frequency::Weekly,
        Platform::Google,
        "Analyze this week's Google Ads performance. Evaluate CTR, average CPC and cost per \
         conversion, point out notable movements in the daily trend, and suggest keyword and \
         bidding adjustments for next week.",
    ),
    (
        Frequency::Monthly,
        Platform::Meta,
        "Analyze this month's Meta (Facebook/Instagram) advertising performance. Summarize the \
         month as a whole, describe how results developed over the period, and propose next \
         month's budget allocation and creative strategy.",
    ),
    (
        Frequency::Monthly,
        Platform::Google,
        "Analyze this month's Google Ads performance. Summarize the month as a whole, describe \
         how results developed over the period, and propose next month's budget, keyword and \
         bidding strategy.",
    ),
];

pub fn prompt_template(frequency: Frequency, platform: Platform) -> &'static str {
    PROMPTS
        .iter()
        .find(|(f, p, _)| *f == frequency && *p == platform)
        .map(|(_, _, text)| *text)
        .unwrap_or(PROMPTS[0].2)
}

/// Template, period line and (when non-empty) the daily CSV breakdown.
pub fn build_prompt(
    frequency: Frequency,
    platform: Platform,
    range: &DateRange,
    daily_csv: Option<&str>,
) -> String {
    let mut prompt = format!(
        "{}\n\nPeriod: {} to {}",
        prompt_template(frequency, platform),
        range.start,
        range.end
    );
    if let Some(csv) = daily_csv {
        prompt.push_str("\n\nDaily breakdown (semicolon-separated):\n");
        prompt.push_str(csv);
    }
    prompt
}

/// Aggregate a fetched snapshot and package it for analysis.
pub fn build_request(
    platform: Platform,
    report_type: Frequency,
    snapshot: ProviderSnapshot,
    range: DateRange,
    currency: Option<String>,
) -> AnalysisRequest {
    let csv = match daily_breakdown_csv(&snapshot.insights) {
        Ok(csv) => csv,
        Err(e) => {
            warn!(error = %e, "daily breakdown CSV failed; prompt sent without it");
            None
        }
    };
    AnalysisRequest {
        platform,
        report_type,
        metrics: aggregate(&snapshot.insights),
        prompt: build_prompt(report_type, platform, &range, csv.as_deref()),
        insights: snapshot.insights,
        campaigns: snapshot.campaigns,
        time_range: range,
        currency,
    }
}

/// Analysis with guaranteed fallback.
pub struct AnalysisService {
    primary: Option<Arc<dyn AiPort>>,
    timeout: Duration,
}

impl AnalysisService {
    /// `primary` is the external analysis client; `None` means rules only.
    pub fn new(primary: Option<Arc<dyn AiPort>>, timeout: Duration) -> Self {
        Self { primary, timeout }
    }

    pub fn rules_only() -> Self {
        Self::new(None, Duration::from_secs(0))
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult {
        let Some(primary) = &self.primary else {
            debug!(platform = %request.platform, "no analysis service; using rule-based analysis");
            return RuleBasedAnalyzer::generate(&request.metrics, request.currency.as_deref());
        };

        match tokio::time::timeout(self.timeout, primary.analyze(request)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(platform = %request.platform, error = %e, "analysis failed; using rule-based fallback");
                RuleBasedAnalyzer::generate(&request.metrics, request.currency.as_deref())
            }
            Err(_) => {
                warn!(
                    platform = %request.platform,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "analysis timed out; using rule-based fallback"
                );
                RuleBasedAnalyzer::generate(&request.metrics, request.currency.as_deref())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::insights::{MetaInsight, RawNumber};
    use crate::domain::{DomainError, InsightBatch};
    use chrono::NaiveDate;

    struct FailingAi;

    #[async_trait::async_trait]
    impl AiPort for FailingAi {
        async fn analyze(&self, _: &AnalysisRequest) -> Result<AnalysisResult, DomainError> {
            Err(DomainError::Analysis("API error 502".into()))
        }
    }

    struct SlowAi;

    #[async_trait::async_trait]
    impl AiPort for SlowAi {
        async fn analyze(&self, _: &AnalysisRequest) -> Result<AnalysisResult, DomainError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(canned())
        }
    }

    struct CannedAi;

    #[async_trait::async_trait]
    impl AiPort for CannedAi {
        async fn analyze(&self, _: &AnalysisRequest) -> Result<AnalysisResult, DomainError> {
            Ok(canned())
        }
    }

    fn canned() -> AnalysisResult {
        AnalysisResult {
            summary: "from service".into(),
            insights: vec![],
            recommendations: vec![],
        }
    }

    fn range() -> DateRange {
        DateRange {
            start: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
        }
    }

    fn request() -> AnalysisRequest {
        let snapshot = ProviderSnapshot {
            insights: InsightBatch::Meta(vec![MetaInsight {
                impressions: RawNumber::new("125000"),
                clicks: RawNumber::new("3500"),
                spend: RawNumber::new("4500.50"),
                conversions: RawNumber::new("280"),
                date_start: Some("2024-03-04".into()),
                date_stop: Some("2024-03-04".into()),
            }]),
            campaigns: vec![],
        };
        build_request(Platform::Meta, Frequency::Weekly, snapshot, range(), Some("JPY".into()))
    }

    #[test]
    fn every_frequency_platform_pair_has_its_own_prompt() {
        let mut seen = std::collections::HashSet::new();
        for f in [Frequency::Weekly, Frequency::Monthly] {
            for p in [Platform::Meta, Platform::Google] {
                assert!(seen.insert(prompt_template(f, p)));
            }
        }
        assert!(prompt_template(Frequency::Monthly, Platform::Google).contains("this month's Google"));
    }

    #[test]
    fn request_carries_metrics_and_daily_csv() {
        let req = request();
        assert_eq!(req.metrics.ctr().to_string(), "2.80");
        assert!(req.prompt.contains("Period: 2024-03-04 to 2024-03-11"));
        assert!(req.prompt.contains("2024-03-04;125000;3500;4500.50;280"));
    }

    #[test]
    fn prompt_omits_breakdown_without_rows() {
        let prompt = build_prompt(Frequency::Weekly, Platform::Google, &range(), None);
        assert!(!prompt.contains("Daily breakdown"));
    }

    #[tokio::test]
    async fn service_result_is_used_when_available() {
        let service = AnalysisService::new(Some(Arc::new(CannedAi)), Duration::from_secs(5));
        assert_eq!(service.analyze(&request()).await, canned());
    }

    #[tokio::test]
    async fn failure_falls_back_to_rules() {
        let req = request();
        let service = AnalysisService::new(Some(Arc::new(FailingAi)), Duration::from_secs(5));
        let expected = RuleBasedAnalyzer::generate(&req.metrics, Some("JPY"));
        assert_eq!(service.analyze(&req).await, expected);
    }

    #[tokio::test]
    async fn timeout_falls_back_to_rules() {
        let req = request();
        let service = AnalysisService::new(Some(Arc::new(SlowAi)), Duration::from_millis(50));
        let result = service.analyze(&req).await;
        assert_ne!(result, canned());
        assert!(result.summary.contains("Total spend: 4,500.50 JPY"));
    }

    #[tokio::test]
    async fn rules_only_never_calls_out() {
        let service = AnalysisService::rules_only();
        assert!(!service.has_primary());
        let result = service.analyze(&request()).await;
        assert_eq!(result.recommendations.len(), 3);
    }
}
