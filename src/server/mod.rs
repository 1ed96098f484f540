//! The scrape endpoint.
//!
//! `GET /metrics?host=&apiKey=&scheme=` — request parameters override the
//! process-wide defaults; a scrape without a resolvable host is a 400,
//! without an API key a 401. The assembled registry is rendered in the
//! Prometheus text exposition format and discarded.

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

use crate::orchestrator;

/// Defaults resolved from flags and environment at startup; shared read-only
/// between concurrent scrapes.
pub struct ExporterDefaults {
    pub host: Option<String>,
    pub api_key: Option<String>,
    pub scheme: String,
}

#[derive(Clone)]
pub struct AppState {
    defaults: Arc<ExporterDefaults>,
}

impl AppState {
    pub fn new(host: Option<String>, api_key: Option<String>, scheme: String) -> Self {
        Self {
            defaults: Arc::new(ExporterDefaults {
                host,
                api_key,
                scheme,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MetricsParams {
    host: Option<String>,
    #[serde(rename = "apiKey")]
    api_key: Option<String>,
    scheme: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn metrics_handler(
    State(state): State<AppState>,
    Query(params): Query<MetricsParams>,
) -> Response {
    let host = params.host.or_else(|| state.defaults.host.clone());
    let api_key = params.api_key.or_else(|| state.defaults.api_key.clone());
    let scheme = params
        .scheme
        .unwrap_or_else(|| state.defaults.scheme.clone());

    let Some(host) = host else {
        return (
            StatusCode::BAD_REQUEST,
            "Query parameter `host` is required, since it is not defined by flags or environment",
        )
            .into_response();
    };
    let Some(api_key) = api_key else {
        return (
            StatusCode::UNAUTHORIZED,
            "Query parameter `apiKey` is required, since it is not defined by flags or environment",
        )
            .into_response();
    };

    let registry = match orchestrator::collect_metrics(&scheme, &host, &api_key).await {
        Ok(registry) => registry,
        Err(err) => {
            error!(%host, error = %err, "scrape failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("metric collection failed: {err:#}"),
            )
                .into_response();
        }
    };

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&registry.gather(), &mut buffer) {
        error!(%host, error = %err, "could not encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "could not encode metrics",
        )
            .into_response();
    }

    ([(header::CONTENT_TYPE, encoder.format_type())], buffer).into_response()
}
