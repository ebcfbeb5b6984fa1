//! Inference API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::header::CACHE_CONTROL;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints::{health, imaging, sentiment, sequence, tabular};
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::dispatch::Dispatcher;

/// Build the inference router.
///
/// Prediction routes use `State<ApiContext>`; the access log wraps
/// everything, health probes included.
pub fn inference_router(dispatcher: Arc<Dispatcher>, max_upload_bytes: usize) -> Router {
    build_router(ApiContext::new(dispatcher, max_upload_bytes))
}

fn build_router(ctx: ApiContext) -> Router {
    let upload_limit = DefaultBodyLimit::max(ctx.max_upload_bytes);

    // Predictions are per-request and patient-specific; never cache them
    let predictions = Router::new()
        .route("/risk", post(tabular::risk))
        .route("/los", post(tabular::length_of_stay))
        .route("/segment", post(tabular::segment))
        .route("/image", post(imaging::diagnose).layer(upload_limit))
        .route("/sequence", post(sequence::predict))
        .route("/sentiment", post(sentiment::classify))
        .route("/sentiment/bulk", post(sentiment::classify_bulk))
        .with_state(ctx)
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    Router::new()
        .route("/", get(health::check))
        .route("/health", get(health::check))
        .merge(predictions)
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
}
