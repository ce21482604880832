use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use haven_core::PdsError;

#[derive(Debug)]
pub struct XrpcError {
    pub status: StatusCode,
    pub error_name: String,
    pub message: String,
}

impl XrpcError {
    pub fn new(status: StatusCode, error_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            error_name: error_name.into(),
            message: message.into(),
        }
    }
}

impl IntoResponse for XrpcError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.error_name,
            "message": self.message,
        });
        (self.status, axum::Json(body)).into_response()
    }
}

impl From<PdsError> for XrpcError {
    fn from(err: PdsError) -> Self {
        match &err {
            PdsError::BadRequest(_) => {
                XrpcError::new(StatusCode::BAD_REQUEST, "InvalidRequest", err.to_string())
            }
            PdsError::Unauthorized(_) => XrpcError::new(
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                err.to_string(),
            ),
            PdsError::Forbidden(_) => {
                XrpcError::new(StatusCode::FORBIDDEN, "AuthorizationError", err.to_string())
            }
            PdsError::NotFound(_) => {
                XrpcError::new(StatusCode::NOT_FOUND, "NotFound", err.to_string())
            }
            PdsError::Conflict(_) => {
                XrpcError::new(StatusCode::CONFLICT, "InvalidSwap", err.to_string())
            }
            PdsError::Internal(_) => XrpcError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                err.to_string(),
            ),
        }
    }
}
