//! Access logging middleware.
//!
//! Tags every request with a fresh request id, runs the handler inside a
//! span carrying it, and logs method, path, status and latency.

use std::time::Instant;

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let request_id = Uuid::new_v4().to_string();
    let started = Instant::now();

    let span = tracing::info_span!("request", %request_id);
    let mut response = next.run(req).instrument(span).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    tracing::info!(%method, %path, status, elapsed_ms, %request_id, "API access");

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
