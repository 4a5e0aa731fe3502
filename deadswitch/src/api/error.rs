//! Maps the crate-wide `Error` onto `{code, message}` JSON responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::Error;

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub code: u16,
    pub message: String,
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(msg) => ApiError::new(StatusCode::BAD_REQUEST, msg),
            Error::NotFound => ApiError::new(StatusCode::NOT_FOUND, "not found"),
            Error::Unauthorized(msg) => ApiError::new(StatusCode::UNAUTHORIZED, msg),
            Error::Crypto(_) | Error::Store(_) | Error::Migrate(_) | Error::Serialization(_) | Error::Io(_) => {
                tracing::error!("internal error: {err}");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
            Error::Notify(_) => {
                tracing::error!("notify error reached the API layer unexpectedly: {err}");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
            Error::Config(_) => {
                tracing::error!("config error reached the API layer unexpectedly: {err}");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            code: self.status.as_u16(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
