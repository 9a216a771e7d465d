//! Route handlers for the batch trigger, schedule management and on-demand reports.

use super::auth::{require_internal_key, AuthUser};
use super::error::ApiError;
use super::extract::JsonBody;
use super::AppState;
use crate::domain::{DateRange, Frequency, Platform, Report, ScheduledReport};
use crate::usecases::report_service::{BatchOutcome, ChatTarget, GenerateRequest};
use crate::usecases::schedule_service::{ScheduleInput, ScheduleListing};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Batch trigger
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct BatchResponse {
    success: bool,
    #[serde(flatten)]
    outcome: BatchOutcome,
}

pub async fn process_scheduled(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<BatchResponse>, ApiError> {
    require_internal_key(&headers, state.internal_api_key.as_deref())?;
    let outcome = state.reports.run_due(Utc::now()).await?;
    crate::usecases::ticker::log_outcome(&outcome);
    Ok(Json(BatchResponse {
        success: true,
        outcome,
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Schedules
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleBody {
    #[serde(default)]
    pub account_id: Option<i64>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub day_of_week: Option<i64>,
    #[serde(default)]
    pub day_of_month: Option<i64>,
    #[serde(default, rename = "chatworkRoomId", alias = "chatRoomId")]
    pub chat_room_id: Option<String>,
    #[serde(default, rename = "chatworkApiToken", alias = "chatApiToken")]
    pub chat_api_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    id: i64,
    account_name: String,
    platform: Platform,
}

/// Schedule as returned to the dashboard. The chat token itself is never echoed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleView {
    id: i64,
    account_id: i64,
    platform: Platform,
    frequency: Frequency,
    day_of_week: Option<u8>,
    day_of_month: Option<u8>,
    #[serde(rename = "chatworkRoomId")]
    chat_room_id: Option<String>,
    has_chat_token: bool,
    is_active: bool,
    last_run_at: Option<DateTime<Utc>>,
    next_run_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    account: Option<AccountSummary>,
}

impl From<ScheduledReport> for ScheduleView {
    fn from(s: ScheduledReport) -> Self {
        Self {
            id: s.id,
            account_id: s.account_id,
            platform: s.platform,
            frequency: s.frequency,
            day_of_week: s.day_of_week,
            day_of_month: s.day_of_month,
            has_chat_token: s.chat_api_token.as_deref().is_some_and(|t| !t.is_empty()),
            chat_room_id: s.chat_room_id,
            is_active: s.is_active,
            last_run_at: s.last_run_at,
            next_run_at: s.next_run_at,
            account: None,
        }
    }
}

impl From<ScheduleListing> for ScheduleView {
    fn from(listing: ScheduleListing) -> Self {
        let mut view = ScheduleView::from(listing.schedule);
        view.account = listing.account.map(|a| AccountSummary {
            id: a.id,
            account_name: a.account_name,
            platform: a.platform,
        });
        view
    }
}

fn parse_frequency(raw: &str) -> Result<Frequency, ApiError> {
    raw.parse::<Frequency>()
        .map_err(|_| ApiError::bad_request("Invalid frequency. Must be weekly or monthly"))
}

fn day_in(value: Option<i64>, range: std::ops::RangeInclusive<i64>, message: &str) -> Result<Option<u8>, ApiError> {
    match value {
        None => Ok(None),
        Some(v) if range.contains(&v) => Ok(Some(v as u8)),
        Some(_) => Err(ApiError::bad_request(message)),
    }
}

impl TryFrom<ScheduleBody> for ScheduleInput {
    type Error = ApiError;

    fn try_from(body: ScheduleBody) -> Result<Self, Self::Error> {
        let (Some(account_id), Some(frequency)) = (body.account_id, body.frequency.as_deref())
        else {
            return Err(ApiError::bad_request("Account ID and frequency are required"));
        };
        Ok(ScheduleInput {
            account_id,
            frequency: parse_frequency(frequency)?,
            day_of_week: day_in(body.day_of_week, 0..=6, "dayOfWeek must be between 0 and 6")?,
            day_of_month: day_in(body.day_of_month, 1..=31, "dayOfMonth must be between 1 and 31")?,
            chat_room_id: body.chat_room_id,
            chat_api_token: body.chat_api_token,
        })
    }
}

pub async fn upsert_schedule(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(body): JsonBody<ScheduleBody>,
) -> Result<Json<Value>, ApiError> {
    let input = ScheduleInput::try_from(body)?;
    let schedule = state.schedules.upsert(&user.id, input, Utc::now()).await?;
    Ok(Json(json!({
        "scheduledReport": ScheduleView::from(schedule),
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub account_id: Option<i64>,
}

pub async fn list_schedules(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let schedules: Vec<ScheduleView> = state
        .schedules
        .list(&user.id, query.account_id)
        .await?
        .into_iter()
        .map(ScheduleView::from)
        .collect();
    Ok(Json(json!({ "scheduledReports": schedules })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub id: Option<i64>,
}

pub async fn delete_schedule(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<Value>, ApiError> {
    let id = query
        .id
        .ok_or_else(|| ApiError::bad_request("Scheduled report ID is required"))?;
    state.schedules.delete(&user.id, id).await?;
    Ok(Json(json!({ "success": true })))
}

// ─────────────────────────────────────────────────────────────────────────────
// On-demand reports
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DateRangeBody {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody {
    #[serde(default)]
    pub account_id: Option<i64>,
    #[serde(default)]
    pub date_range: Option<DateRangeBody>,
    #[serde(default)]
    pub report_type: Option<String>,
    #[serde(default)]
    pub send_to_chatwork: bool,
    #[serde(default, alias = "chatRoomId")]
    pub chatwork_room_id: Option<String>,
    #[serde(default, alias = "chatApiToken")]
    pub chatwork_api_token: Option<String>,
}

fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request(format!("{field} must be a YYYY-MM-DD date")))
}

impl TryFrom<GenerateBody> for GenerateRequest {
    type Error = ApiError;

    fn try_from(body: GenerateBody) -> Result<Self, Self::Error> {
        let (Some(account_id), Some(range)) = (body.account_id, body.date_range) else {
            return Err(ApiError::bad_request("Account ID and date range are required"));
        };
        let report_type = match body.report_type.as_deref() {
            Some(raw) => parse_frequency(raw)?,
            None => Frequency::Weekly,
        };
        let chat = match (body.send_to_chatwork, body.chatwork_room_id, body.chatwork_api_token) {
            (true, Some(room_id), Some(api_token)) => Some(ChatTarget { room_id, api_token }),
            _ => None,
        };
        Ok(GenerateRequest {
            account_id,
            report_type,
            date_range: DateRange {
                start: parse_date(&range.start, "dateRange.start")?,
                end: parse_date(&range.end, "dateRange.end")?,
            },
            chat,
        })
    }
}

#[derive(Serialize)]
pub struct ReportResponse {
    success: bool,
    report: Report,
}

pub async fn generate_report(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(body): JsonBody<GenerateBody>,
) -> Result<Json<ReportResponse>, ApiError> {
    let request = GenerateRequest::try_from(body)?;
    let report = state.reports.generate_now(&user.id, request, Utc::now()).await?;
    Ok(Json(ReportResponse {
        success: true,
        report,
    }))
}
