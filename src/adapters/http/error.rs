//! JSON error responses: `{ "error": ..., "details"?: ... }`.

use crate::domain::DomainError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            details: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let (status, message, details) = match &err {
            DomainError::Auth(_) => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string(), None),
            DomainError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone(), None),
            DomainError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string(), None),
            DomainError::BatchAlreadyRunning => (StatusCode::CONFLICT, err.to_string(), None),
            _ => {
                tracing::error!(error = %err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    Some(err.to_string()),
                )
            }
        };
        Self {
            status,
            message,
            details,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: &self.message,
            details: self.details.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (DomainError::Auth("bad token".into()), StatusCode::UNAUTHORIZED),
            (DomainError::validation("Invalid frequency"), StatusCode::BAD_REQUEST),
            (DomainError::not_found("Account"), StatusCode::NOT_FOUND),
            (DomainError::BatchAlreadyRunning, StatusCode::CONFLICT),
            (DomainError::Repo("disk full".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn internal_errors_carry_details() {
        let err = ApiError::from(DomainError::Repo("disk full".into()));
        assert_eq!(err.message, "Internal server error");
        assert_eq!(err.details.as_deref(), Some("Repository error: disk full"));
    }
}
