use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::response::{ApiResponse, FieldIssue};

pub const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request data")]
    Validation(Vec<FieldIssue>),

    #[error("User already exists with this email")]
    DuplicateUser,

    /// Same message for an unknown email and a wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not authorized")]
    UnauthorizedUser,

    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("Route not found")]
    NotFound,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateUser => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Unauthenticated(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::UnauthorizedUser => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Configuration(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            AppError::Validation(issues) => {
                warn!(issues = issues.len(), "request validation failed");
                ApiResponse::failure("Invalid request data", Some(issues))
            }
            AppError::Configuration(msg) => {
                error!(error = %msg, "configuration error while serving request");
                ApiResponse::failure(INTERNAL_MESSAGE, None)
            }
            AppError::Internal(e) => {
                error!(error = ?e, "internal error");
                ApiResponse::failure(INTERNAL_MESSAGE, None)
            }
            other => ApiResponse::failure(other.to_string(), None),
        };
        (status, Json(body)).into_response()
    }
}
