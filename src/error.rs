use std::time::Duration;

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::appointments::AppointmentStatus;

/// Domain failures shared by every service. Stores and services return these;
/// only the HTTP layer turns them into status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Please sign in to continue.")]
    AuthenticationRequired,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("This appointment is already {0} and can no longer be changed.")]
    TerminalState(AppointmentStatus),

    #[error("This record was changed elsewhere. Refresh and try again.")]
    Conflict,

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("backend error: {0}")]
    Network(String),

    #[error("backend did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Invalid verification code.")]
    InvalidCode,

    #[error("Incorrect PIN.")]
    InvalidPin,

    #[error("No PIN has been set for this account. Verify with a one-time code.")]
    PinNotSet,

    #[error("This device is not registered. Verify with a one-time code.")]
    DeviceNotBound,

    #[error("Too many attempts. Request a new one-time code.")]
    TooManyAttempts,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field,
            message: message.into(),
        }
    }

    /// External dependency failures; callers may retry these.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Upload(_) | AppError::Network(_) | AppError::Timeout(_)
        )
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Network(e.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    Invalid(&'static str, String),
    NotFound(&'static str, String),
    Conflict(&'static str, String),
    TooManyRequests(&'static str, String),
    BadGateway(&'static str, String),
    Unavailable(&'static str, String),
    Timeout(String),
    Internal(String),
    /// The request never reached a handler: body, path or query could not be extracted.
    Rejected(StatusCode, String),
}

const RETRY_MESSAGE: &str = "Something went wrong on our side. Please try again.";

impl ApiError {
    fn to_error_response(code: &str, message: &str, field: Option<&str>) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
                field: field.map(str::to_string),
            },
        })
    }
}

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        let message = e.to_string();
        match e {
            AppError::Validation { field, message } => ApiError::Invalid(field, message),
            AppError::AuthenticationRequired => ApiError::Unauthorized("AUTH_REQUIRED", message),
            AppError::NotFound(_) => ApiError::NotFound("NOT_FOUND", message),
            AppError::TerminalState(_) => ApiError::Conflict("TERMINAL_STATE", message),
            AppError::Conflict => ApiError::Conflict("STALE_VERSION", message),
            AppError::InvalidCode => ApiError::Unauthorized("INVALID_CODE", message),
            AppError::InvalidPin => ApiError::Unauthorized("INVALID_PIN", message),
            AppError::PinNotSet => ApiError::Forbidden("PIN_NOT_SET", message),
            AppError::DeviceNotBound => ApiError::Forbidden("DEVICE_NOT_BOUND", message),
            AppError::TooManyAttempts => ApiError::TooManyRequests("TOO_MANY_ATTEMPTS", message),
            AppError::Upload(detail) => {
                tracing::warn!("blob upload failed: {detail}");
                ApiError::BadGateway(
                    "UPLOAD_FAILED",
                    "The file could not be uploaded. Please try again.".into(),
                )
            }
            AppError::Network(detail) => {
                tracing::error!("backend error: {detail}");
                ApiError::Unavailable("BACKEND_UNAVAILABLE", RETRY_MESSAGE.into())
            }
            AppError::Internal(detail) => ApiError::Internal(detail),
            AppError::Timeout(limit) => {
                tracing::error!("backend timed out after {limit:?}");
                ApiError::Timeout(
                    "The service is taking too long to respond. Please try again.".into(),
                )
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        ApiError::Rejected(r.status(), r.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(r: PathRejection) -> Self {
        ApiError::Rejected(r.status(), r.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(r: QueryRejection) -> Self {
        ApiError::Rejected(r.status(), r.body_text())
    }
}

fn rejection_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::PAYLOAD_TOO_LARGE => "PAYLOAD_TOO_LARGE",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "UNSUPPORTED_MEDIA_TYPE",
        _ => "MALFORMED_REQUEST",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, msg, field) = match self {
            ApiError::Unauthorized(code, msg) => (StatusCode::UNAUTHORIZED, code, msg, None),
            ApiError::Forbidden(code, msg) => (StatusCode::FORBIDDEN, code, msg, None),
            ApiError::BadRequest(code, msg) => (StatusCode::BAD_REQUEST, code, msg, None),
            ApiError::Invalid(field, msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg, Some(field))
            }
            ApiError::NotFound(code, msg) => (StatusCode::NOT_FOUND, code, msg, None),
            ApiError::Conflict(code, msg) => (StatusCode::CONFLICT, code, msg, None),
            ApiError::TooManyRequests(code, msg) => {
                (StatusCode::TOO_MANY_REQUESTS, code, msg, None)
            }
            ApiError::BadGateway(code, msg) => (StatusCode::BAD_GATEWAY, code, msg, None),
            ApiError::Unavailable(code, msg) => (StatusCode::SERVICE_UNAVAILABLE, code, msg, None),
            ApiError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", msg, None),
            ApiError::Rejected(status, msg) => {
                tracing::debug!(%status, "request rejected: {msg}");
                (status, rejection_code(status), msg, None)
            }
            ApiError::Internal(msg) => {
                tracing::error!("internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    RETRY_MESSAGE.to_string(),
                    None,
                )
            }
        };
        (status, ApiError::to_error_response(code, &msg, field)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_keeps_the_field_and_message() {
        let api: ApiError = AppError::invalid("type", "Please select an appointment type").into();
        match api {
            ApiError::Invalid(field, msg) => {
                assert_eq!(field, "type");
                assert_eq!(msg, "Please select an appointment type");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn backend_details_do_not_reach_the_client() {
        let api: ApiError = AppError::Network("password authentication failed for user x".into()).into();
        match api {
            ApiError::Unavailable(code, msg) => {
                assert_eq!(code, "BACKEND_UNAVAILABLE");
                assert!(!msg.contains("password"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn only_external_failures_are_retryable() {
        assert!(AppError::Timeout(Duration::from_secs(20)).is_retryable());
        assert!(AppError::Upload("disk full".into()).is_retryable());
        assert!(!AppError::TerminalState(AppointmentStatus::Cancelled).is_retryable());
        assert!(!AppError::AuthenticationRequired.is_retryable());
    }

    #[test]
    fn terminal_state_message_names_the_status() {
        let e = AppError::TerminalState(AppointmentStatus::Cancelled);
        assert_eq!(
            e.to_string(),
            "This appointment is already Cancelled and can no longer be changed."
        );
    }
}
