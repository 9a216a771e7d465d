//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these; the HTTP layer maps these to status codes.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Not authenticated: {0}")]
    Auth(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Provider API error: {0}")]
    Provider(String),

    /// Refreshing an expired OAuth credential failed; the account cannot be queried.
    #[error("Credential refresh failed: {0}")]
    CredentialRefresh(String),

    #[error("Analysis failed: {0}")]
    Analysis(String),

    #[error("Chat delivery failed: {0}")]
    Delivery(String),

    #[error("Repository error: {0}")]
    Repo(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Another batch invocation holds the single-flight guard.
    #[error("A scheduled-report batch is already running")]
    BatchAlreadyRunning,
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}
