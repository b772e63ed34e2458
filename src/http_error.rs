use crate::openai::GenerationError;
use crate::store::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: Option<String>,
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub code: Option<String>,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), code: None }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody { error: self.message, code: self.code };
        (self.status, Json(body)).into_response()
    }
}

impl From<(StatusCode, String)> for AppError {
    fn from((status, msg): (StatusCode, String)) -> Self {
        AppError::new(status, msg)
    }
}

impl From<GenerationError> for AppError {
    fn from(e: GenerationError) -> Self {
        let message = format!("Failed to generate story: {}", e);
        match e {
            GenerationError::RateLimit => {
                AppError::new(StatusCode::TOO_MANY_REQUESTS, message).with_code("rate_limited")
            }
            GenerationError::Timeout => {
                AppError::new(StatusCode::GATEWAY_TIMEOUT, message).with_code("provider_timeout")
            }
            GenerationError::Auth => {
                AppError::new(StatusCode::BAD_GATEWAY, message).with_code("provider_auth")
            }
            _ => AppError::new(StatusCode::BAD_GATEWAY, message).with_code("generation_failed"),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DeleteFailed(_) => {
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                    .with_code("delete_failed")
            }
            other => AppError::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
                .with_code("store_error"),
        }
    }
}
