//! Inbound HTTP adapter (axum): batch trigger, schedule management, on-demand reports.

pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;

use crate::usecases::{ReportService, ScheduleService};
use axum::routing::{get, post};
use axum::Router;
use std::fmt;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub reports: Arc<ReportService>,
    pub schedules: Arc<ScheduleService>,
    /// HS256 secret for session tokens. Unset rejects every session route.
    pub jwt_secret: Option<String>,
    /// Bearer key for the batch trigger. Unset or empty rejects every trigger.
    pub internal_api_key: Option<String>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[REDACTED]"))
            .field("internal_api_key", &self.internal_api_key.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/reports/process-scheduled",
            post(handlers::process_scheduled),
        )
        .route(
            "/api/reports/schedule",
            post(handlers::upsert_schedule)
                .get(handlers::list_schedules)
                .delete(handlers::delete_schedule),
        )
        .route("/api/reports/generate", post(handlers::generate_report))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
