//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{
    AccountCredentials, AdAccount, AnalysisResult, Campaign, CanonicalMetrics, DateRange,
    DomainError, Frequency, InsightBatch, NewAdAccount, NewReport, NewSchedule, Platform,
    RefreshedToken, Report, ScheduledReport,
};
use chrono::{DateTime, Utc};

/// Linked advertising accounts.
#[async_trait::async_trait]
pub trait AccountRepo: Send + Sync {
    async fn get_account(&self, id: i64) -> Result<Option<AdAccount>, DomainError>;

    /// Active account owned by `user_id`, or None.
    async fn find_owned_active(
        &self,
        user_id: &str,
        id: i64,
    ) -> Result<Option<AdAccount>, DomainError>;

    /// Insert or re-link; unique per (user, platform, external account id).
    /// Re-linking rotates the tokens and reactivates the account.
    async fn upsert_account(&self, account: NewAdAccount) -> Result<AdAccount, DomainError>;

    /// Persist a refreshed credential.
    async fn update_credentials(
        &self,
        id: i64,
        token: &RefreshedToken,
    ) -> Result<(), DomainError>;

    /// Soft (de)activation; accounts are never physically removed here.
    async fn set_active(&self, id: i64, active: bool) -> Result<(), DomainError>;

    async fn mark_synced(&self, id: i64, at: DateTime<Utc>) -> Result<(), DomainError>;
}

/// Recurring report requests.
#[async_trait::async_trait]
pub trait ScheduleRepo: Send + Sync {
    /// Active schedules with `next_run_at <= cutoff`, ordered by `next_run_at` ascending.
    async fn list_due(&self, cutoff: DateTime<Utc>) -> Result<Vec<ScheduledReport>, DomainError>;

    /// Create, or update the existing schedule for the same (user, account).
    async fn upsert_schedule(&self, schedule: NewSchedule)
    -> Result<ScheduledReport, DomainError>;

    /// Active schedules of a user, optionally for one account, `next_run_at` ascending.
    async fn list_for_user(
        &self,
        user_id: &str,
        account_id: Option<i64>,
    ) -> Result<Vec<ScheduledReport>, DomainError>;

    async fn find_owned(
        &self,
        user_id: &str,
        id: i64,
    ) -> Result<Option<ScheduledReport>, DomainError>;

    async fn delete_schedule(&self, id: i64) -> Result<(), DomainError>;
}

/// Completed reports.
#[async_trait::async_trait]
pub trait ReportRepo: Send + Sync {
    /// Insert a report produced on demand.
    async fn create_report(&self, report: NewReport) -> Result<Report, DomainError>;

    /// Insert the report of a scheduled run and advance the schedule in one transaction.
    /// A second call for the same schedule and date range returns the existing report.
    async fn complete_scheduled_run(
        &self,
        report: NewReport,
        schedule_id: i64,
        ran_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> Result<Report, DomainError>;

    /// Record a successful chat delivery.
    async fn mark_delivered(&self, report_id: i64, room_id: &str) -> Result<(), DomainError>;
}

/// Raw data pulled from an ad platform for one period.
#[derive(Debug, Clone)]
pub struct ProviderSnapshot {
    pub insights: InsightBatch,
    pub campaigns: Vec<Campaign>,
}

/// Ad platform API. One implementation per platform; credentials are passed per call.
#[async_trait::async_trait]
pub trait AdsGateway: Send + Sync {
    fn platform(&self) -> Platform;

    /// Daily insight rows and campaign list for `range`.
    async fn fetch_snapshot(
        &self,
        credentials: &AccountCredentials,
        range: &DateRange,
    ) -> Result<ProviderSnapshot, DomainError>;

    /// Exchange the stored credential for a fresh access token.
    async fn refresh_token(
        &self,
        credentials: &AccountCredentials,
    ) -> Result<RefreshedToken, DomainError>;
}

/// Everything the analysis service receives for one report.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub platform: Platform,
    pub report_type: Frequency,
    pub metrics: CanonicalMetrics,
    pub insights: InsightBatch,
    pub campaigns: Vec<Campaign>,
    pub time_range: DateRange,
    pub prompt: String,
    /// Account currency code, used by the rule-based generator.
    pub currency: Option<String>,
}

/// AI port. Produces summary/insights/recommendations for a snapshot.
#[async_trait::async_trait]
pub trait AiPort: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, DomainError>;
}
