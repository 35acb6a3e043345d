//! Scrape handler

use axum::{extract::State, http::header, response::IntoResponse};

use crate::api::ExporterState;
use crate::metrics::exposition::CONTENT_TYPE;

/// Render the registry in Prometheus text format
pub async fn metrics(State(state): State<ExporterState>) -> impl IntoResponse {
    let body = state.registry.render().await;
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body)
}
