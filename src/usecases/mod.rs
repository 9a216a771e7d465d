//! Application use cases. Orchestrate domain logic via ports.

pub mod analysis_service;
pub mod report_service;
pub mod schedule_service;
pub mod ticker;

pub use analysis_service::AnalysisService;
pub use report_service::{AdsProviders, BatchOutcome, ReportService};
pub use schedule_service::ScheduleService;
pub use ticker::Ticker;
