//! Request errors and their JSON rendering.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use haneul::HaneulError;
use serde::Serialize;
use thiserror::Error;

/// A failed request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The multipart body had no ``file`` field.
    #[error("no file uploaded; send the image in the `file` field")]
    MissingFile,

    /// The multipart body could not be read.
    #[error("invalid upload: {0}")]
    Multipart(#[from] MultipartError),

    /// The classifier rejected the request.
    #[error(transparent)]
    Model(#[from] HaneulError),

    /// The server failed independently of the input.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// The HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingFile => StatusCode::BAD_REQUEST,
            ApiError::Multipart(err) => err.status(),
            ApiError::Model(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Model(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Always false.
    pub success: bool,

    /// Human-readable reason.
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::warn!(status = status.as_u16(), error = %self, "request failed");
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
