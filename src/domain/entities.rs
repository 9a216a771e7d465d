//! Domain entities. Pure data structures for the core business.
//!
//! No HTTP/SQL types here; adapters map to and from these.

use crate::domain::errors::DomainError;
use crate::domain::metrics::CanonicalMetrics;
use chrono::{DateTime, Months, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Advertising platform an account is linked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Meta,
    Google,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Meta => "meta",
            Platform::Google => "google",
        }
    }

    /// Human-facing name used in prompts and chat messages.
    pub fn display_name(self) -> &'static str {
        match self {
            Platform::Meta => "Meta",
            Platform::Google => "Google",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meta" => Ok(Platform::Meta),
            "google" => Ok(Platform::Google),
            other => Err(DomainError::validation(format!(
                "Unknown platform '{}'",
                other
            ))),
        }
    }
}

/// Recurrence of a scheduled report. Also used as a report's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            other => Err(DomainError::validation(format!(
                "frequency must be 'weekly' or 'monthly', got '{}'",
                other
            ))),
        }
    }
}

/// Inclusive reporting period, serialized as ISO dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Period ending `today` covering one cycle of `frequency`.
    /// Monthly ranges clamp to the end of a shorter previous month.
    pub fn trailing(frequency: Frequency, today: NaiveDate) -> Self {
        let start = match frequency {
            Frequency::Weekly => today - TimeDelta::days(7),
            Frequency::Monthly => today.checked_sub_months(Months::new(1)).unwrap_or(today),
        };
        Self { start, end: today }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.start > self.end {
            return Err(DomainError::validation(
                "dateRange.start must not be after dateRange.end",
            ));
        }
        Ok(())
    }
}

/// OAuth material for one account, passed explicitly into every provider call.
#[derive(Clone)]
pub struct AccountCredentials {
    pub external_account_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Google only: developer token from account metadata, if any.
    pub developer_token: Option<String>,
}

impl fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("external_account_id", &self.external_account_id)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

/// Result of a successful OAuth refresh.
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    /// Present when the provider rotated the refresh credential too.
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// One linked advertising account.
#[derive(Clone)]
pub struct AdAccount {
    pub id: i64,
    pub user_id: String,
    pub platform: Platform,
    pub external_account_id: String,
    pub account_name: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

impl fmt::Debug for AdAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdAccount")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("platform", &self.platform)
            .field("external_account_id", &self.external_account_id)
            .field("account_name", &self.account_name)
            .field("is_active", &self.is_active)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl AdAccount {
    /// True when the account can be queried: active and holding a non-empty access token.
    pub fn is_usable(&self) -> bool {
        self.is_active
            && self
                .access_token
                .as_deref()
                .is_some_and(|t| !t.trim().is_empty())
    }

    pub fn credential_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    fn metadata_str(&self, key: &str) -> Option<String> {
        self.metadata
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// ISO currency code stored at link time (e.g. "JPY").
    pub fn currency(&self) -> Option<String> {
        self.metadata_str("currency")
    }

    pub fn credentials(&self) -> AccountCredentials {
        AccountCredentials {
            external_account_id: self.external_account_id.clone(),
            access_token: self.access_token.clone().unwrap_or_default(),
            refresh_token: self.refresh_token.clone().filter(|t| !t.is_empty()),
            developer_token: self.metadata_str("developerToken"),
        }
    }
}

/// Input for creating or re-linking an account. Unique per (user, platform, external id).
#[derive(Debug, Clone)]
pub struct NewAdAccount {
    pub user_id: String,
    pub platform: Platform,
    pub external_account_id: String,
    pub account_name: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

/// Recurring report request for one account.
#[derive(Clone)]
pub struct ScheduledReport {
    pub id: i64,
    pub user_id: String,
    pub account_id: i64,
    pub platform: Platform,
    pub frequency: Frequency,
    /// 0 = Sunday .. 6 = Saturday; weekly only.
    pub day_of_week: Option<u8>,
    /// 1..=31; monthly only.
    pub day_of_month: Option<u8>,
    pub chat_room_id: Option<String>,
    pub chat_api_token: Option<String>,
    pub is_active: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: DateTime<Utc>,
}

impl fmt::Debug for ScheduledReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledReport")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("account_id", &self.account_id)
            .field("frequency", &self.frequency)
            .field("day_of_week", &self.day_of_week)
            .field("day_of_month", &self.day_of_month)
            .field("chat_room_id", &self.chat_room_id)
            .field("is_active", &self.is_active)
            .field("next_run_at", &self.next_run_at)
            .finish_non_exhaustive()
    }
}

impl ScheduledReport {
    /// Room and token, only when both are present.
    pub fn chat_target(&self) -> Option<(&str, &str)> {
        match (self.chat_room_id.as_deref(), self.chat_api_token.as_deref()) {
            (Some(room), Some(token)) if !room.is_empty() && !token.is_empty() => {
                Some((room, token))
            }
            _ => None,
        }
    }
}

/// Chat room ids are numeric; they are used as a URL path segment.
pub fn validate_chat_room_id(room_id: &str) -> Result<(), DomainError> {
    if room_id.is_empty() || !room_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DomainError::validation("chatworkRoomId must be numeric"));
    }
    Ok(())
}

/// Upsert input for a schedule, keyed by (user, account).
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub user_id: String,
    pub account_id: i64,
    pub platform: Platform,
    pub frequency: Frequency,
    pub day_of_week: Option<u8>,
    pub day_of_month: Option<u8>,
    pub chat_room_id: Option<String>,
    pub chat_api_token: Option<String>,
    pub next_run_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Completed,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Completed => "completed",
        }
    }
}

/// Summary, insights and recommendations for one metrics snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: String,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Immutable record of one completed analysis cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: i64,
    pub user_id: String,
    pub account_id: i64,
    pub scheduled_report_id: Option<i64>,
    pub platform: Platform,
    pub report_type: Frequency,
    pub date_range: DateRange,
    pub metrics: CanonicalMetrics,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub summary: String,
    pub status: ReportStatus,
    pub sent_to_chat: bool,
    pub chat_room_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert input for a report. Always persisted as `completed`.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub user_id: String,
    pub account_id: i64,
    pub scheduled_report_id: Option<i64>,
    pub platform: Platform,
    pub report_type: Frequency,
    pub date_range: DateRange,
    pub metrics: CanonicalMetrics,
    pub analysis: AnalysisResult,
    pub created_at: DateTime<Utc>,
}

/// Campaign summary passed through to the analysis service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn chat_room_id_must_be_digits() {
        assert!(validate_chat_room_id("123456").is_ok());
        assert!(validate_chat_room_id("").is_err());
        assert!(validate_chat_room_id("12/../members").is_err());
        assert!(validate_chat_room_id("12?force=1").is_err());
    }

    #[test]
    fn trailing_weekly_range_spans_seven_days() {
        let range = DateRange::trailing(Frequency::Weekly, date(2024, 3, 11));
        assert_eq!(range.start, date(2024, 3, 4));
        assert_eq!(range.end, date(2024, 3, 11));
    }

    #[test]
    fn trailing_monthly_range_clamps_short_month() {
        let range = DateRange::trailing(Frequency::Monthly, date(2024, 3, 31));
        assert_eq!(range.start, date(2024, 2, 29));
    }

    #[test]
    fn account_without_token_is_not_usable() {
        let mut account = AdAccount {
            id: 1,
            user_id: "u1".into(),
            platform: Platform::Meta,
            external_account_id: "act_1".into(),
            account_name: "Shop".into(),
            access_token: Some("  ".into()),
            refresh_token: None,
            expires_at: None,
            is_active: true,
            last_synced_at: None,
            metadata: serde_json::json!({ "currency": "JPY" }),
        };
        assert!(!account.is_usable());
        account.access_token = Some("tok".into());
        assert!(account.is_usable());
        account.is_active = false;
        assert!(!account.is_usable());
        assert_eq!(account.currency().as_deref(), Some("JPY"));
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let creds = AccountCredentials {
            external_account_id: "123".into(),
            access_token: "secret-access".into(),
            refresh_token: Some("secret-refresh".into()),
            developer_token: None,
        };
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
    }

    #[test]
    fn platform_round_trips_through_str() {
        assert_eq!("google".parse::<Platform>().unwrap(), Platform::Google);
        assert!("tiktok".parse::<Platform>().is_err());
        assert!("daily".parse::<Frequency>().is_err());
    }
}
