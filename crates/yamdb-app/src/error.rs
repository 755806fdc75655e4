use std::collections::BTreeMap;

use axum::{response::IntoResponse, Json};
use http::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, error};

pub const NON_FIELD_ERRORS: &str = "non_field_errors";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Validation failed: {0}")]
    Validation(#[from] garde::Report),
    #[error("Invalid field {field}: {message}")]
    FieldError {
        field: &'static str,
        message: String,
    },
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Permission denied")]
    Forbidden,
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::FieldError {
            field,
            message: message.into(),
        }
    }
}

fn detail(message: &str) -> Value {
    json!({ "detail": message })
}

/// Groups validation messages by field path
pub fn report_to_fields(report: &garde::Report) -> BTreeMap<String, Vec<String>> {
    let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (path, error) in report.iter() {
        let mut field = path.to_string();
        if field.is_empty() {
            field = NON_FIELD_ERRORS.to_string();
        }
        fields
            .entry(field)
            .or_default()
            .push(error.message().to_string());
    }
    fields
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::InvalidQuery(msg) | ApiError::InvalidRequest(msg) => {
                debug!("Bad request: {msg}");
                (StatusCode::BAD_REQUEST, Json(detail(&msg))).into_response()
            }
            ApiError::Validation(report) => {
                debug!("Validation failed: {report}");
                (StatusCode::BAD_REQUEST, Json(report_to_fields(&report))).into_response()
            }
            ApiError::FieldError { field, message } => {
                (StatusCode::BAD_REQUEST, Json(json!({ field: [message] }))).into_response()
            }
            ApiError::Unauthorized(msg) => {
                debug!("Unauthorized: {msg}");
                (
                    StatusCode::UNAUTHORIZED,
                    Json(detail("Given token not valid for any token type")),
                )
                    .into_response()
            }
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(detail("You do not have permission to perform this action.")),
            )
                .into_response(),
            ApiError::ResourceNotFound(what) => {
                debug!("{what} not found");
                (StatusCode::NOT_FOUND, Json(detail("Not found."))).into_response()
            }
            ApiError::InternalError(msg) => {
                error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(detail("Internal server error")),
                )
                    .into_response()
            }
        }
    }
}

impl From<yamdb_dal::Error> for ApiError {
    fn from(value: yamdb_dal::Error) -> Self {
        match value {
            yamdb_dal::Error::RecordNotFound(what) => ApiError::ResourceNotFound(what),
            yamdb_dal::Error::AlreadyExists { field, message } => {
                ApiError::FieldError { field, message }
            }
            yamdb_dal::Error::InvalidReference { field, value } => {
                ApiError::field(field, format!("Object with slug={value} does not exist"))
            }
            yamdb_dal::Error::InvalidOrderByField(field) => {
                ApiError::InvalidQuery(format!("Cannot order by {field}"))
            }
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl From<yamdb_auth::Error> for ApiError {
    fn from(value: yamdb_auth::Error) -> Self {
        ApiError::InternalError(value.to_string())
    }
}

impl From<crate::mail::MailError> for ApiError {
    fn from(value: crate::mail::MailError) -> Self {
        ApiError::InternalError(value.to_string())
    }
}

pub type ApiResult<T, E = ApiError> = std::result::Result<T, E>;
