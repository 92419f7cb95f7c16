use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::{database::DatabaseError, models::ApiResponse};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid user")]
    Unauthorized,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Validation(&'static str),

    #[error("Malformed payload")]
    MalformedPayload,

    #[error("{0}")]
    Conflict(&'static str),

    #[error("Server Error")]
    Upstream(#[from] DatabaseError),

    #[error("Server Error")]
    Provider(#[from] reqwest::Error),

    #[error("Server Error")]
    Internal(#[from] anyhow::Error),
}

impl From<JsonRejection> for AppError {
    fn from(_: JsonRejection) -> Self {
        AppError::MalformedPayload
    }
}

impl From<PathRejection> for AppError {
    fn from(_: PathRejection) -> Self {
        AppError::NotFound
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Unauthorized | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::MalformedPayload => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Upstream(e) => {
                error!("Storage failure: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Provider(e) => {
                error!("Identity provider failure: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Internal(e) => {
                error!("Internal failure: {e:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match self {
            AppError::Validation(message) | AppError::Conflict(message) => message,
            AppError::Unauthorized => "Invalid user",
            AppError::InvalidCredentials => "Invalid email or password",
            AppError::NotFound => "Not found",
            AppError::MalformedPayload => "Malformed payload",
            AppError::Upstream(_) | AppError::Provider(_) | AppError::Internal(_) => "Server Error",
        };

        (status, Json(ApiResponse::message(message))).into_response()
    }
}
