//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use booking::{BookingServiceError, ErrorKind};

/// API-level error type that maps to HTTP responses.
///
/// Every error renders as `{"message": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed caller identity.
    Unauthorized(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Resource not found, or not visible to the caller.
    NotFound(String),
    /// Booking service failure.
    Service(BookingServiceError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Service(err) => match err.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Gateway => StatusCode::BAD_GATEWAY,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Unauthorized(msg) | ApiError::BadRequest(msg) | ApiError::NotFound(msg) => {
                msg
            }
            ApiError::Service(err) => match err.kind() {
                ErrorKind::Internal => {
                    tracing::error!(error = %err, "internal server error");
                    "Internal server error".to_string()
                }
                ErrorKind::Gateway => {
                    tracing::warn!(error = %err, "payment gateway failure");
                    match err {
                        BookingServiceError::PaymentNotCompleted { .. }
                        | BookingServiceError::AmountMismatch { .. } => err.to_string(),
                        _ => "Payment provider request failed".to_string(),
                    }
                }
                _ => err.to_string(),
            },
        };

        let body = serde_json::json!({ "message": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<BookingServiceError> for ApiError {
    fn from(err: BookingServiceError) -> Self {
        ApiError::Service(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
