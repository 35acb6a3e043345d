//! Error handling module

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Device error: {0}")]
    Device(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid metric: {0}")]
    InvalidMetric(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<config::ConfigError> for ExporterError {
    fn from(e: config::ConfigError) -> Self {
        ExporterError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExporterError>;

impl IntoResponse for ExporterError {
    fn into_response(self) -> Response {
        let status = match &self {
            ExporterError::NotFound(_) => StatusCode::NOT_FOUND,
            ExporterError::Device(_) | ExporterError::Http(_) => StatusCode::BAD_GATEWAY,
            ExporterError::Config(_) | ExporterError::InvalidMetric(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}
