//! Image classification endpoint.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Multipart, State};
use axum::Json;
use tracing::{debug, warn};

use nscan_inference::PipelineError;
use nscan_models::ClassificationResult;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Content types accepted for upload.
pub const ALLOWED_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];

/// `POST /predict` — classify one uploaded image.
///
/// Upload constraints (content type, empty, oversized) are rejected here
/// before the pipeline runs; classification itself happens on a blocking
/// task since decode, resize and inference are CPU-bound.
pub async fn predict(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<ClassificationResult>> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart payload: {e}")))?
    {
        if field.name() == Some("image") {
            let content_type = field.content_type().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {e}")))?;
            upload = Some((content_type, data));
            break;
        }
    }

    let (content_type, data) =
        upload.ok_or_else(|| ApiError::bad_request("Missing 'image' field in upload"))?;

    match content_type.as_deref() {
        Some(ct) if ALLOWED_TYPES.contains(&ct) => {}
        Some(ct) => {
            return Err(ApiError::bad_request(format!(
                "Invalid file type '{ct}'. Upload a JPEG, PNG or WEBP image."
            )));
        }
        None => {
            return Err(ApiError::bad_request(
                "Upload is missing a content type. Upload a JPEG, PNG or WEBP image.",
            ));
        }
    }

    if data.is_empty() {
        return Err(ApiError::bad_request("Uploaded file is empty."));
    }
    if data.len() > state.config.max_upload_size {
        return Err(ApiError::payload_too_large(format!(
            "File too large. Maximum size is {} bytes.",
            state.config.max_upload_size
        )));
    }

    debug!(bytes = data.len(), "Running classification");

    let pipeline = Arc::clone(&state.pipeline);
    let start = Instant::now();
    let result = tokio::task::spawn_blocking(move || pipeline.classify(&data))
        .await
        .map_err(|e| ApiError::internal(format!("Classification task failed: {e}")))?;
    let elapsed = start.elapsed().as_secs_f64();

    match result {
        Ok(result) => {
            metrics::record_classification("ok", elapsed);
            Ok(Json(result))
        }
        Err(PipelineError::Preprocess(e)) => {
            metrics::record_classification("client_error", elapsed);
            Err(ApiError::bad_request(format!("Could not read image: {e}")))
        }
        Err(PipelineError::Inference(e)) => {
            metrics::record_classification("server_error", elapsed);
            warn!(error = %e, "Inference failed on loaded model");
            Err(ApiError::internal(format!("Prediction failed: {e}")))
        }
    }
}
