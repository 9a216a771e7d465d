//! In-process scheduler: runs the due-schedule batch on a fixed cadence.
//!
//! Shares the batch runner's single-flight guard with the HTTP trigger, so a tick that
//! lands while a triggered batch is still running is skipped.

use crate::domain::DomainError;
use crate::usecases::report_service::{BatchOutcome, ReportService};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub struct Ticker {
    reports: Arc<ReportService>,
    interval: Duration,
}

impl Ticker {
    pub fn new(reports: Arc<ReportService>, interval: Duration) -> Self {
        Self { reports, interval }
    }

    /// One batch at the current time, logged. Returns the outcome when the batch ran.
    pub async fn tick(&self) -> Option<BatchOutcome> {
        match self.reports.run_due(Utc::now()).await {
            Ok(outcome) => {
                log_outcome(&outcome);
                Some(outcome)
            }
            Err(DomainError::BatchAlreadyRunning) => {
                info!("batch already running; skipping tick");
                None
            }
            Err(e) => {
                error!(error = %e, "batch failed before processing schedules");
                None
            }
        }
    }

    /// Run forever: tick, then sleep for the interval.
    pub async fn run_loop(&self) {
        info!(interval_secs = self.interval.as_secs(), "scheduler started");
        loop {
            self.tick().await;
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// One line per failed item plus a summary line.
pub fn log_outcome(outcome: &BatchOutcome) {
    for item in outcome.results.iter().filter(|r| r.error.is_some()) {
        warn!(
            schedule_id = item.scheduled_report_id,
            account_id = item.account_id,
            error = item.error.as_deref().unwrap_or_default(),
            "schedule failed"
        );
    }
    info!(
        processed = outcome.processed,
        failed = outcome.failed(),
        "scheduled batch finished"
    );
}
