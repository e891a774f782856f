use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use jira::JiraError;
use serde_json::{json, Value};
use std::fmt;

use crate::common::ValidationError;
use crate::kernel::jobs::SearchError;

pub type ApiResult<T> = Result<T, ApiError>;

const NO_DETAILS: &str = "No additional details available";

/// Error envelope for every JSON route: `{error}` for client errors,
/// `{error, details}` when a relay to Jira failed.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// A failed remote call. Jira's response body becomes `details` when
    /// there was one.
    pub fn upstream(err: anyhow::Error) -> Self {
        let details = err
            .downcast_ref::<JiraError>()
            .and_then(JiraError::details)
            .unwrap_or_else(|| Value::String(NO_DETAILS.to_string()));

        tracing::warn!(error = %format!("{err:#}"), "jira request failed");

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{err:#}"),
            details: Some(details),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.message, "details": details }),
            None => json!({ "error": self.message }),
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::bad_request(err.to_string())
    }
}

/// Unreadable request bodies (bad JSON, wrong types, missing content type)
/// are client errors like any other validation failure.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Validation(e) => e.into(),
            SearchError::Remote(e) => Self::upstream(e),
        }
    }
}
