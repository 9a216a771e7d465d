//! Rule-based analysis: deterministic summary, insights and recommendations.
//!
//! Used whenever the external analysis service is unavailable, and directly when no
//! analysis service is configured. A pure function of its input; it cannot fail.

use crate::domain::metrics::fixed2;
use crate::domain::{AnalysisResult, CanonicalMetrics, DomainError, Platform};
use crate::ports::{AiPort, AnalysisRequest};
use rust_decimal::Decimal;
use tracing::debug;

const CTR_HIGH: i64 = 3;
const CTR_LOW: i64 = 1;
const CPC_EFFICIENT: i64 = 100;
const CPC_HIGH: i64 = 150;
const CPA_GOOD: i64 = 1000;
const CPA_HIGH: i64 = 2000;
const AB_TEST_SPEND: i64 = 10_000;

const META_RECOMMENDATIONS: [&str; 3] = [
    "Split audiences into finer segments to strengthen personalization",
    "Test video ad formats",
    "Expand retargeting campaigns",
];

const GOOGLE_RECOMMENDATIONS: [&str; 3] = [
    "Broaden search keywords and tighten negative keywords",
    "Make fuller use of ad assets (extensions)",
    "Consider switching to automated Smart Bidding strategies",
];

const AB_TEST_RECOMMENDATION: &str =
    "Run A/B tests to identify the most effective ad elements";

/// Rule-based analyzer. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedAnalyzer;

impl RuleBasedAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Build the full analysis triple for a snapshot.
    pub fn generate(metrics: &CanonicalMetrics, currency: Option<&str>) -> AnalysisResult {
        AnalysisResult {
            summary: summary(metrics, currency),
            insights: insights(metrics),
            recommendations: recommendations(metrics),
        }
    }
}

#[async_trait::async_trait]
impl AiPort for RuleBasedAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, DomainError> {
        debug!(platform = %request.platform, "generating rule-based analysis");
        Ok(Self::generate(&request.metrics, request.currency.as_deref()))
    }
}

/// Fixed summary template; the cost line reads the platform's own cost field.
pub fn summary(metrics: &CanonicalMetrics, currency: Option<&str>) -> String {
    let spend = format_amount(metrics.total_spend());
    let spend = match currency {
        Some(code) => format!("{} {}", spend, code),
        None => spend,
    };
    format!(
        "Performance summary for the period:\n\
         - Total impressions: {}\n\
         - Total clicks: {}\n\
         - Average CTR: {}%\n\
         - Total spend: {}\n\
         - Conversions: {}\n",
        group_thousands(metrics.impressions()),
        group_thousands(metrics.clicks()),
        metrics.ctr(),
        spend,
        group_thousands(metrics.conversions()),
    )
}

pub fn insights(metrics: &CanonicalMetrics) -> Vec<String> {
    let mut out = Vec::new();
    let ctr = metrics.ctr();
    let cpc = metrics.cost_per_click();

    if ctr > Decimal::from(CTR_HIGH) {
        out.push("CTR is above the industry average; the ad creatives are performing well.");
    } else if ctr < Decimal::from(CTR_LOW) {
        out.push("CTR is low; review the ad copy and targeting.");
    }

    if cpc < Decimal::from(CPC_EFFICIENT) {
        out.push("CPC is being kept at an efficient level.");
    } else if cpc > Decimal::from(CPC_HIGH) {
        out.push("CPC is on the high side; consider optimizing the bidding strategy.");
    }

    if metrics.conversions() > 0 {
        let cpa = metrics.cost_per_conversion();
        if cpa < Decimal::from(CPA_GOOD) {
            out.push(
                "Cost per conversion is healthy; keep the current strategy and consider scaling up.",
            );
        } else if cpa > Decimal::from(CPA_HIGH) {
            out.push(
                "Cost per conversion is high; review targeting and landing pages.",
            );
        }
    }

    out.into_iter().map(str::to_string).collect()
}

pub fn recommendations(metrics: &CanonicalMetrics) -> Vec<String> {
    let base = match metrics.platform() {
        Platform::Meta => META_RECOMMENDATIONS,
        Platform::Google => GOOGLE_RECOMMENDATIONS,
    };
    let mut out: Vec<String> = base.iter().map(|s| s.to_string()).collect();
    if metrics.total_spend() > Decimal::from(AB_TEST_SPEND) {
        out.push(AB_TEST_RECOMMENDATION.to_string());
    }
    out
}

/// `1234567` -> `"1,234,567"`.
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Two-decimal amount with grouped integer part: `4500.5` -> `"4,500.50"`.
pub fn format_amount(value: Decimal) -> String {
    let text = fixed2(value.abs()).to_string();
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let grouped = int_part
        .parse::<u64>()
        .map(group_thousands)
        .unwrap_or_else(|_| int_part.to_string());
    let sign = if value.is_sign_negative() && !value.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}{}.{}", sign, grouped, frac_part)
}
