//! API module - HTTP handlers and routes

pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::metrics::MetricsRegistry;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ExporterState {
    pub registry: Arc<MetricsRegistry>,
    pub start_time: Instant,
}

impl ExporterState {
    pub fn new(registry: Arc<MetricsRegistry>) -> Self {
        Self {
            registry,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

pub fn routes() -> Router<ExporterState> {
    Router::new()
        .route("/metrics", get(handlers::metrics))
        .route("/health", get(handlers::health_check))
        .fallback(handlers::not_found)
}

/// Full application: routes, state and request tracing
pub fn app(state: ExporterState) -> Router {
    routes()
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
