//! HTTP handlers module

mod scrape;

pub use self::scrape::*;

use axum::{extract::State, http::Uri, response::IntoResponse, Json};
use serde::Serialize;

use super::ExporterState;
use crate::error::ExporterError;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub devices: usize,
    pub uptime_seconds: u64,
}

/// Health check handler
pub async fn health_check(State(state): State<ExporterState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "dyson-exporter".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        devices: state.registry.device_count().await,
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Anything outside the known routes
pub async fn not_found(uri: Uri) -> ExporterError {
    ExporterError::NotFound(uri.path().to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::api::{app, ExporterState};
    use crate::metrics::MetricsRegistry;

    async fn send(
        registry: Arc<MetricsRegistry>,
        method: Method,
        uri: &str,
    ) -> (StatusCode, Option<String>, String) {
        let response = app(ExporterState::new(registry))
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let registry = Arc::new(MetricsRegistry::new());
        registry.set("fan1", "power", 1.0).await.unwrap();
        registry.set("fan1", "power", 0.0).await.unwrap();

        let (status, content_type, body) = send(registry, Method::GET, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            content_type.as_deref(),
            Some("text/plain; version=0.0.4; charset=utf-8")
        );
        assert_eq!(
            body,
            "# TYPE power gauge\npower{serial=\"fan1\",name=\"fan1\"} 0\n"
        );
    }

    #[tokio::test]
    async fn test_metrics_endpoint_empty_registry() {
        let (status, _, body) =
            send(Arc::new(MetricsRegistry::new()), Method::GET, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let (status, _, body) =
            send(Arc::new(MetricsRegistry::new()), Method::GET, "/metricz").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], 404);
    }

    #[tokio::test]
    async fn test_wrong_method_is_405() {
        let (status, _, _) =
            send(Arc::new(MetricsRegistry::new()), Method::POST, "/metrics").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_health() {
        let registry = Arc::new(MetricsRegistry::new());
        registry.set("fan1", "power", 1.0).await.unwrap();

        let (status, _, body) = send(registry, Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["devices"], 1);
    }
}
