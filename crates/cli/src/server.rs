//! Scrape endpoint.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use fleet_collect::SnapshotCollector;
use metrics::histogram;
use tracing::error;

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub fn router(collector: Arc<SnapshotCollector>) -> Router {
    Router::new()
        .route("/metrics", get(scrape))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(collector)
}

async fn scrape(State(collector): State<Arc<SnapshotCollector>>) -> Response {
    let started = Instant::now();
    match collector.render() {
        Ok(body) => {
            histogram!("fleet_scrape_ms", started.elapsed().as_secs_f64() * 1000.0);
            ([(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], body).into_response()
        }
        Err(e) => {
            error!(error = %e, "rendering snapshot failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
