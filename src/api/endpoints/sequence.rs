//! Time-series risk endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::dispatch::{PredictionResult, TaskRequest};

#[derive(Debug, Deserialize)]
pub struct SequenceRequest {
    /// Full history window, oldest timestep first. Callers monitoring a
    /// patient resend the growing window on every call.
    pub sequence: Vec<Vec<f32>>,
}

/// `POST /sequence`: `T x F` window → `{"prediction": float}`.
pub async fn predict(
    State(ctx): State<ApiContext>,
    payload: Result<Json<SequenceRequest>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let Json(req) = payload?;
    let request = TaskRequest::Sequence(req.sequence);
    let result = ctx.run(move |d| d.dispatch(&request)).await?;
    Ok(Json(result))
}
