//! Unified error types for the GA4 dashboard backend.

use axum::{
    http::StatusCode as HttpStatus,
    response::{IntoResponse, Response},
    Json,
};
use reqwest::StatusCode;
use serde_json::json;
use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),
}

/// Authentication-related errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Token request failed with status {status}: {body}")]
    TokenRequestFailed { status: StatusCode, body: String },

    #[error("Token parse error: {0}")]
    TokenParse(String),

    #[error("Failed to sign token assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Report request/response errors.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP error {status}: {body}")]
    HttpError { status: StatusCode, body: String },

    #[error("Provider error [{code}]: {message}")]
    ProviderError {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("Malformed report: {0}")]
    MalformedReport(String),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// Request-boundary error for `GET /api/analytics`.
///
/// The detail is logged; the body only ever carries a generic message in the
/// `{"success": false, "error": ...}` envelope.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] ApiError),
}

impl AppError {
    fn status_and_message(&self) -> (HttpStatus, &'static str) {
        match self {
            AppError::Config(_) => (
                HttpStatus::INTERNAL_SERVER_ERROR,
                "Analytics service is not configured",
            ),
            AppError::Fetch(ApiError::Auth(_)) => (
                HttpStatus::BAD_GATEWAY,
                "Failed to authenticate with analytics provider",
            ),
            AppError::Fetch(_) => (HttpStatus::BAD_GATEWAY, "Failed to fetch analytics data"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        match &self {
            AppError::Config(e) => tracing::error!(error = %e, "analytics configuration error"),
            AppError::Fetch(e) => tracing::error!(error = %e, "analytics fetch failed"),
        }

        (
            status,
            Json(json!({
                "success": false,
                "error": message,
            })),
        )
            .into_response()
    }
}
