//! Report use case: the scheduled batch runner and on-demand report generation.
//!
//! Per due schedule: load account -> refresh credential if expired -> fetch snapshot ->
//! aggregate + analyze -> persist report and reschedule (one transaction) -> deliver.
//! A failing schedule becomes an `error` entry and the batch moves on; a schedule whose
//! account is missing, inactive or token-less is skipped without an entry.

use crate::domain::schedule::{due_cutoff, next_run_utc};
use crate::domain::{
    validate_chat_room_id, AdAccount, DateRange, DomainError, Frequency, NewReport, Platform,
    Report, ScheduledReport,
};
use crate::ports::{
    AccountRepo, AdsGateway, ChatDeliveryPort, ProviderSnapshot, ReportRepo, ScheduleRepo,
};
use crate::usecases::analysis_service::{build_request, AnalysisService};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

/// Ad platform gateways by platform.
#[derive(Clone, Default)]
pub struct AdsProviders {
    gateways: HashMap<Platform, Arc<dyn AdsGateway>>,
}

impl AdsProviders {
    pub fn new(gateways: Vec<Arc<dyn AdsGateway>>) -> Self {
        Self {
            gateways: gateways.into_iter().map(|g| (g.platform(), g)).collect(),
        }
    }

    pub fn get(&self, platform: Platform) -> Result<&Arc<dyn AdsGateway>, DomainError> {
        self.gateways
            .get(&platform)
            .ok_or_else(|| DomainError::Config(format!("no gateway for platform {}", platform)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Success,
    Error,
}

/// Outcome of one processed schedule.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOutcome {
    pub scheduled_report_id: i64,
    pub account_id: i64,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub processed: usize,
    pub results: Vec<ItemOutcome>,
}

impl BatchOutcome {
    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == ItemStatus::Error)
            .count()
    }
}

/// Chat room to push an on-demand report to.
#[derive(Debug, Clone)]
pub struct ChatTarget {
    pub room_id: String,
    pub api_token: String,
}

/// On-demand report for an owned account and explicit period.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub account_id: i64,
    pub report_type: Frequency,
    pub date_range: DateRange,
    pub chat: Option<ChatTarget>,
}

pub struct ReportService {
    accounts: Arc<dyn AccountRepo>,
    schedules: Arc<dyn ScheduleRepo>,
    reports: Arc<dyn ReportRepo>,
    providers: AdsProviders,
    analysis: Arc<AnalysisService>,
    chat: Arc<dyn ChatDeliveryPort>,
    /// Local offset in which schedule run times (09:00) are computed.
    schedule_offset: FixedOffset,
    batch_guard: Mutex<()>,
}

impl ReportService {
    pub fn new(
        accounts: Arc<dyn AccountRepo>,
        schedules: Arc<dyn ScheduleRepo>,
        reports: Arc<dyn ReportRepo>,
        providers: AdsProviders,
        analysis: Arc<AnalysisService>,
        chat: Arc<dyn ChatDeliveryPort>,
        schedule_offset: FixedOffset,
    ) -> Self {
        Self {
            accounts,
            schedules,
            reports,
            providers,
            analysis,
            chat,
            schedule_offset,
            batch_guard: Mutex::new(()),
        }
    }

    /// Claim the single batch slot, or fail if a batch is in flight.
    pub(crate) fn try_begin_batch(&self) -> Result<MutexGuard<'_, ()>, DomainError> {
        self.batch_guard
            .try_lock()
            .map_err(|_| DomainError::BatchAlreadyRunning)
    }

    /// Process every active schedule due by `now + 1h`, in `next_run_at` order.
    ///
    /// Only the due-selection read can fail the whole call. A concurrent call is
    /// refused with [`DomainError::BatchAlreadyRunning`].
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<BatchOutcome, DomainError> {
        let _guard = self.try_begin_batch()?;

        let due = self.schedules.list_due(due_cutoff(now)).await?;
        info!(due = due.len(), "processing due schedules");

        let mut results = Vec::with_capacity(due.len());
        for schedule in &due {
            match self.process_schedule(schedule, now).await {
                Ok(Some(report)) => results.push(ItemOutcome {
                    scheduled_report_id: schedule.id,
                    account_id: schedule.account_id,
                    status: ItemStatus::Success,
                    report_id: Some(report.id),
                    error: None,
                }),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        schedule_id = schedule.id,
                        account_id = schedule.account_id,
                        error = %e,
                        "scheduled report failed"
                    );
                    results.push(ItemOutcome {
                        scheduled_report_id: schedule.id,
                        account_id: schedule.account_id,
                        status: ItemStatus::Error,
                        report_id: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let outcome = BatchOutcome {
            processed: results.len(),
            results,
        };
        info!(
            processed = outcome.processed,
            failed = outcome.failed(),
            "batch complete"
        );
        Ok(outcome)
    }

    /// `Ok(None)` when the schedule is skipped.
    async fn process_schedule(
        &self,
        schedule: &ScheduledReport,
        now: DateTime<Utc>,
    ) -> Result<Option<Report>, DomainError> {
        let account = match self.accounts.get_account(schedule.account_id).await? {
            Some(account) if account.is_usable() => account,
            Some(_) => {
                info!(
                    schedule_id = schedule.id,
                    account_id = schedule.account_id,
                    "account inactive or without token; skipping"
                );
                return Ok(None);
            }
            None => {
                info!(
                    schedule_id = schedule.id,
                    account_id = schedule.account_id,
                    "account not found; skipping"
                );
                return Ok(None);
            }
        };

        let range = DateRange::trailing(schedule.frequency, now.date_naive());
        let snapshot = self.fetch_snapshot(&account, &range, now).await?;
        let request = build_request(
            account.platform,
            schedule.frequency,
            snapshot,
            range,
            account.currency(),
        );
        let analysis = self.analysis.analyze(&request).await;

        let next_run_at = next_run_utc(
            schedule.frequency,
            schedule.day_of_week,
            schedule.day_of_month,
            now,
            self.schedule_offset,
        );
        let mut report = self
            .reports
            .complete_scheduled_run(
                NewReport {
                    user_id: schedule.user_id.clone(),
                    account_id: account.id,
                    scheduled_report_id: Some(schedule.id),
                    platform: account.platform,
                    report_type: schedule.frequency,
                    date_range: range,
                    metrics: request.metrics,
                    analysis,
                    created_at: now,
                },
                schedule.id,
                now,
                next_run_at,
            )
            .await?;
        info!(
            schedule_id = schedule.id,
            report_id = report.id,
            next_run_at = %next_run_at,
            "report stored and schedule advanced"
        );

        match schedule.chat_target() {
            Some(_) if report.sent_to_chat => {
                info!(report_id = report.id, "report for this period already delivered");
            }
            Some((room_id, token)) => {
                self.deliver(&mut report, room_id, token, &account.account_name)
                    .await;
            }
            None => {}
        }
        Ok(Some(report))
    }

    /// Refresh an expired credential when possible, then fetch the period's data.
    async fn fetch_snapshot(
        &self,
        account: &AdAccount,
        range: &DateRange,
        now: DateTime<Utc>,
    ) -> Result<ProviderSnapshot, DomainError> {
        let gateway = self.providers.get(account.platform)?;
        let mut credentials = account.credentials();

        if account.credential_expired(now) && credentials.refresh_token.is_some() {
            info!(account_id = account.id, platform = %account.platform, "refreshing expired credential");
            let token = gateway.refresh_token(&credentials).await?;
            self.accounts.update_credentials(account.id, &token).await?;
            credentials.access_token = token.access_token;
            if let Some(rotated) = token.refresh_token {
                credentials.refresh_token = Some(rotated);
            }
        }

        let snapshot = gateway.fetch_snapshot(&credentials, range).await?;
        if let Err(e) = self.accounts.mark_synced(account.id, now).await {
            warn!(account_id = account.id, error = %e, "failed to record sync time");
        }
        Ok(snapshot)
    }

    /// Push to chat and record delivery. Failures are logged only.
    async fn deliver(&self, report: &mut Report, room_id: &str, token: &str, account_name: &str) {
        if let Err(e) = self
            .chat
            .deliver_report(room_id, token, report, account_name)
            .await
        {
            warn!(report_id = report.id, room_id, error = %e, "chat delivery failed");
            return;
        }
        match self.reports.mark_delivered(report.id, room_id).await {
            Ok(()) => {
                report.sent_to_chat = true;
                report.chat_room_id = Some(room_id.to_string());
            }
            Err(e) => warn!(report_id = report.id, error = %e, "failed to record delivery"),
        }
    }

    /// Build a report right now for an owned, active account.
    pub async fn generate_now(
        &self,
        user_id: &str,
        request: GenerateRequest,
        now: DateTime<Utc>,
    ) -> Result<Report, DomainError> {
        request.date_range.validate()?;
        if let Some(chat) = request.chat.as_ref().filter(|c| !c.room_id.is_empty()) {
            validate_chat_room_id(&chat.room_id)?;
        }
        let account = self
            .accounts
            .find_owned_active(user_id, request.account_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Account"))?;
        if !account.is_usable() {
            return Err(DomainError::validation("Account has no access token; re-link it"));
        }

        let snapshot = self
            .fetch_snapshot(&account, &request.date_range, now)
            .await?;
        let analysis_request = build_request(
            account.platform,
            request.report_type,
            snapshot,
            request.date_range,
            account.currency(),
        );
        let analysis = self.analysis.analyze(&analysis_request).await;

        let mut report = self
            .reports
            .create_report(NewReport {
                user_id: user_id.to_string(),
                account_id: account.id,
                scheduled_report_id: None,
                platform: account.platform,
                report_type: request.report_type,
                date_range: request.date_range,
                metrics: analysis_request.metrics,
                analysis,
                created_at: now,
            })
            .await?;
        info!(report_id = report.id, account_id = account.id, "on-demand report stored");

        if let Some(chat) = request.chat.filter(|c| !c.room_id.is_empty() && !c.api_token.is_empty()) {
            self.deliver(&mut report, &chat.room_id, &chat.api_token, &account.account_name)
                .await;
        }
        Ok(report)
    }
}
