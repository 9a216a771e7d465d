//! ad-report-scheduler: scheduled Meta/Google ad reports with AI analysis, in Hexagonal Architecture.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod shared;
pub mod usecases;
