//! Image upload endpoint.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::dispatch::{PredictionResult, TaskRequest};
use crate::preprocess::decode_upload;

/// Multipart field carrying the image bytes.
const FILE_FIELD: &str = "file";

/// `POST /image`: multipart JPEG/PNG → `{"Result": ...}`.
pub async fn diagnose(
    State(ctx): State<ApiContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let mut multipart = multipart?;
    let mut upload: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            upload = Some(field.bytes().await?.to_vec());
        }
    }

    let bytes = upload.ok_or_else(|| {
        ApiError::MalformedRequest(format!("multipart field `{FILE_FIELD}` is required"))
    })?;
    tracing::debug!(size = bytes.len(), "Image upload received");

    let result = ctx
        .run(move |d| {
            let image = decode_upload(&bytes)?;
            d.dispatch(&TaskRequest::Image(image))
        })
        .await?;
    Ok(Json(result))
}
