//! Analysis adapters: the external analysis-service client and the rule-based generator.

pub mod analysis_client;
pub mod csv_utils;
pub mod rule_based;

pub use analysis_client::AnalysisClient;
pub use rule_based::RuleBasedAnalyzer;
