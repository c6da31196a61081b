use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use avatar_types::api::ApiFailure;

use crate::imaging::ImageError;

/// Every way a request can fail. Handlers return this and the single
/// `IntoResponse` impl below turns it into `{success: false, message}`.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad client input: missing field, disallowed or corrupt image, missing
    /// query parameter.
    #[error("{0}")]
    Validation(String),

    /// No avatar for the user id, or no user for the username/company pair.
    #[error("{0}")]
    NotFound(String),

    /// Store unreachable, query failure, or any other unexpected fault.
    #[error("Server error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ImageError> for AppError {
    fn from(err: ImageError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ApiFailure::new(self.to_string()))).into_response()
    }
}
