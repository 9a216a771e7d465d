//! Schedule management: create/update, list and delete a user's recurring reports.

use crate::domain::schedule::{
    next_run_utc, validate_anchor, DEFAULT_DAY_OF_MONTH, DEFAULT_DAY_OF_WEEK,
};
use crate::domain::{
    validate_chat_room_id, AdAccount, DomainError, Frequency, NewSchedule, ScheduledReport,
};
use crate::ports::{AccountRepo, ScheduleRepo};
use chrono::{DateTime, FixedOffset, Utc};
use std::sync::Arc;
use tracing::info;

/// User input for an upsert. Anchors not relevant to `frequency` are dropped.
#[derive(Debug, Clone)]
pub struct ScheduleInput {
    pub account_id: i64,
    pub frequency: Frequency,
    pub day_of_week: Option<u8>,
    pub day_of_month: Option<u8>,
    pub chat_room_id: Option<String>,
    pub chat_api_token: Option<String>,
}

/// A schedule together with its linked account, when it still exists.
#[derive(Debug, Clone)]
pub struct ScheduleListing {
    pub schedule: ScheduledReport,
    pub account: Option<AdAccount>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct ScheduleService {
    accounts: Arc<dyn AccountRepo>,
    schedules: Arc<dyn ScheduleRepo>,
    schedule_offset: FixedOffset,
}

impl ScheduleService {
    pub fn new(
        accounts: Arc<dyn AccountRepo>,
        schedules: Arc<dyn ScheduleRepo>,
        schedule_offset: FixedOffset,
    ) -> Self {
        Self {
            accounts,
            schedules,
            schedule_offset,
        }
    }

    /// Create the user's schedule for an account, or update the existing one.
    /// `next_run_at` is recomputed from `now` every time.
    pub async fn upsert(
        &self,
        user_id: &str,
        input: ScheduleInput,
        now: DateTime<Utc>,
    ) -> Result<ScheduledReport, DomainError> {
        validate_anchor(input.day_of_week, input.day_of_month)?;
        let chat_room_id = non_blank(input.chat_room_id);
        if let Some(room_id) = chat_room_id.as_deref() {
            validate_chat_room_id(room_id)?;
        }
        let account = self
            .accounts
            .find_owned_active(user_id, input.account_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Account"))?;

        let (day_of_week, day_of_month) = match input.frequency {
            Frequency::Weekly => (Some(input.day_of_week.unwrap_or(DEFAULT_DAY_OF_WEEK)), None),
            Frequency::Monthly => (None, Some(input.day_of_month.unwrap_or(DEFAULT_DAY_OF_MONTH))),
        };
        let next_run_at = next_run_utc(
            input.frequency,
            day_of_week,
            day_of_month,
            now,
            self.schedule_offset,
        );

        let schedule = self
            .schedules
            .upsert_schedule(NewSchedule {
                user_id: user_id.to_string(),
                account_id: account.id,
                platform: account.platform,
                frequency: input.frequency,
                day_of_week,
                day_of_month,
                chat_room_id,
                chat_api_token: non_blank(input.chat_api_token),
                next_run_at,
            })
            .await?;
        info!(
            schedule_id = schedule.id,
            account_id = account.id,
            frequency = %schedule.frequency,
            next_run_at = %schedule.next_run_at,
            "schedule saved"
        );
        Ok(schedule)
    }

    pub async fn list(
        &self,
        user_id: &str,
        account_id: Option<i64>,
    ) -> Result<Vec<ScheduleListing>, DomainError> {
        let schedules = self.schedules.list_for_user(user_id, account_id).await?;
        let mut out = Vec::with_capacity(schedules.len());
        for schedule in schedules {
            let account = self.accounts.get_account(schedule.account_id).await?;
            out.push(ScheduleListing { schedule, account });
        }
        Ok(out)
    }

    pub async fn delete(&self, user_id: &str, id: i64) -> Result<(), DomainError> {
        self.schedules
            .find_owned(user_id, id)
            .await?
            .ok_or_else(|| DomainError::not_found("Scheduled report"))?;
        self.schedules.delete_schedule(id).await?;
        info!(schedule_id = id, "schedule deleted");
        Ok(())
    }
}
