//! Chatwork adapter. Implements ChatDeliveryPort by posting one message per report.

use crate::adapters::ai::rule_based::{format_amount, group_thousands};
use crate::domain::{validate_chat_room_id, CanonicalMetrics, DomainError, Frequency, Report};
use crate::ports::ChatDeliveryPort;
use reqwest::Client;
use std::fmt::Write as _;
use tracing::info;

pub const DEFAULT_CHATWORK_URL: &str = "https://api.chatwork.com/v2";

/// Chatwork REST adapter. The API token is per schedule and passed per call.
pub struct ChatworkAdapter {
    client: Client,
    base_url: String,
}

impl ChatworkAdapter {
    pub fn new(client: Client, base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        Self {
            client,
            base_url: if base_url.is_empty() {
                DEFAULT_CHATWORK_URL.to_string()
            } else {
                base_url.to_string()
            },
        }
    }
}

fn frequency_label(frequency: Frequency) -> &'static str {
    match frequency {
        Frequency::Weekly => "Weekly",
        Frequency::Monthly => "Monthly",
    }
}

fn metric_lines(metrics: &CanonicalMetrics) -> Vec<(&'static str, String)> {
    match metrics {
        CanonicalMetrics::Meta(m) => vec![
            ("Impressions", group_thousands(m.impressions)),
            ("Clicks", group_thousands(m.clicks)),
            ("CTR", format!("{}%", m.ctr)),
            ("Spend", format_amount(m.spend)),
            ("CPC", format_amount(m.cpc)),
            ("Conversions", group_thousands(m.conversions)),
            ("Cost per conversion", format_amount(m.cost_per_conversion)),
        ],
        CanonicalMetrics::Google(m) => vec![
            ("Impressions", group_thousands(m.impressions)),
            ("Clicks", group_thousands(m.clicks)),
            ("CTR", format!("{}%", m.ctr)),
            ("Cost", format_amount(metrics.total_spend())),
            ("Average CPC", format_amount(m.average_cpc)),
            ("Conversions", group_thousands(m.conversions)),
            ("Cost per conversion", format_amount(m.cost_per_conversion)),
        ],
    }
}

fn numbered(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n■ {}", heading);
    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, item);
    }
}

/// Render a report in Chatwork `[info]`/`[title]` markup.
pub fn format_report_message(report: &Report, account_name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "[info][title]{} Ads {} Report: {}[/title]",
        report.platform.display_name(),
        frequency_label(report.report_type),
        account_name
    );
    let _ = writeln!(
        out,
        "Period: {} - {}",
        report.date_range.start.format("%Y-%m-%d"),
        report.date_range.end.format("%Y-%m-%d")
    );

    let _ = writeln!(out, "\n■ Summary\n{}", report.summary.trim_end());

    let _ = writeln!(out, "\n■ Key metrics");
    for (label, value) in metric_lines(&report.metrics) {
        let _ = writeln!(out, "{}: {}", label, value);
    }

    numbered(&mut out, "Insights", &report.insights);
    numbered(&mut out, "Recommendations", &report.recommendations);
    out.push_str("[/info]");
    out
}

#[async_trait::async_trait]
impl ChatDeliveryPort for ChatworkAdapter {
    async fn deliver_report(
        &self,
        room_id: &str,
        api_token: &str,
        report: &Report,
        account_name: &str,
    ) -> Result<(), DomainError> {
        validate_chat_room_id(room_id).map_err(|e| DomainError::Delivery(e.to_string()))?;
        let url = format!("{}/rooms/{}/messages", self.base_url, room_id);
        let body = format_report_message(report, account_name);

        let res = self
            .client
            .post(&url)
            .header("X-ChatWorkToken", api_token)
            .form(&[("body", body.as_str())])
            .send()
            .await
            .map_err(|e| DomainError::Delivery(format!("Request failed: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_else(|_| "unknown".to_string());
            return Err(DomainError::Delivery(format!(
                "Chatwork API error {}: {}",
                status, text
            )));
        }

        info!(report_id = report.id, room_id, "report delivered to chat");
        Ok(())
    }
}
