//! Positional feature-vector endpoints: risk, length of stay, segmentation.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::dispatch::{PredictionResult, TaskRequest};
use crate::pipeline::{LengthOfStayFeatures, RiskFeatures, SegmentFeatures};

#[derive(Debug, Deserialize)]
pub struct FeaturesRequest {
    pub features: Vec<f32>,
}

/// `POST /risk`: 10 features → `{"risk_class": int}`.
pub async fn risk(
    State(ctx): State<ApiContext>,
    payload: Result<Json<FeaturesRequest>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let Json(req) = payload?;
    let request = TaskRequest::Risk(RiskFeatures::from_positional(&req.features)?);
    let result = ctx.run(move |d| d.dispatch(&request)).await?;
    Ok(Json(result))
}

/// `POST /los`: 22 features → `{"length_of_stay": float}`.
pub async fn length_of_stay(
    State(ctx): State<ApiContext>,
    payload: Result<Json<FeaturesRequest>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let Json(req) = payload?;
    let request =
        TaskRequest::LengthOfStay(LengthOfStayFeatures::from_positional(&req.features)?);
    let result = ctx.run(move |d| d.dispatch(&request)).await?;
    Ok(Json(result))
}

/// `POST /segment`: 7 features → `{"cluster": int}`.
pub async fn segment(
    State(ctx): State<ApiContext>,
    payload: Result<Json<FeaturesRequest>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let Json(req) = payload?;
    let request = TaskRequest::Segment(SegmentFeatures::from_positional(&req.features)?);
    let result = ctx.run(move |d| d.dispatch(&request)).await?;
    Ok(Json(result))
}
