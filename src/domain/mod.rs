//! Core domain layer. No external I/O dependencies.
//!
//! Entities, metric normalization/aggregation and schedule arithmetic live here.

pub mod entities;
pub mod errors;
pub mod insights;
pub mod metrics;
pub mod schedule;

pub use entities::{
    AccountCredentials, AdAccount, AnalysisResult, Campaign, DateRange, Frequency, NewAdAccount,
    NewReport, NewSchedule, Platform, RefreshedToken, Report, ReportStatus, ScheduledReport,
    validate_chat_room_id,
};
pub use errors::DomainError;
pub use insights::{GoogleInsight, InsightBatch, MetaInsight};
pub use metrics::CanonicalMetrics;
