//! Port traits. API boundaries for the hexagon.
//!
//! Outbound only: the HTTP layer and the ticker call use cases directly.

pub mod notifier;
pub mod outbound;

pub use notifier::ChatDeliveryPort;
pub use outbound::{
    AccountRepo, AdsGateway, AiPort, AnalysisRequest, ProviderSnapshot, ReportRepo, ScheduleRepo,
};
