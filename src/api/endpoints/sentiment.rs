//! Patient feedback sentiment endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::dispatch::{PredictionResult, TaskRequest};
use crate::pipeline::SentimentPrediction;

#[derive(Debug, Deserialize)]
pub struct SentimentRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkSentimentRequest {
    pub texts: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkSentimentResponse {
    pub results: Vec<SentimentPrediction>,
}

/// `POST /sentiment`: `{"text"}` → `{"probability", "label"}`.
pub async fn classify(
    State(ctx): State<ApiContext>,
    payload: Result<Json<SentimentRequest>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let Json(req) = payload?;
    let request = TaskRequest::Sentiment(req.text);
    let result = ctx.run(move |d| d.dispatch(&request)).await?;
    Ok(Json(result))
}

/// `POST /sentiment/bulk`: one result per text, in order.
pub async fn classify_bulk(
    State(ctx): State<ApiContext>,
    payload: Result<Json<BulkSentimentRequest>, JsonRejection>,
) -> Result<Json<BulkSentimentResponse>, ApiError> {
    let Json(req) = payload?;
    let results = ctx
        .run(move |d| d.dispatch_sentiment_bulk(&req.texts))
        .await?;
    Ok(Json(BulkSentimentResponse { results }))
}
