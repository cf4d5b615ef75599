//! Reference clip upload and download endpoints.

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, Response};
use axum::Json;
use serde_json::json;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// `POST /api/upload-reference` - multipart upload of a WAV conditioning
/// clip. Returns the opaque key a later `/api/tts` call references.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("reference.wav").to_string();
        if !filename.to_ascii_lowercase().ends_with(".wav") {
            return Err(ApiError::bad_request("Only WAV files are supported"));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;

        let key = state.engine.upload_reference(bytes.to_vec())?;
        info!(key = %key, filename = %filename, "Reference clip uploaded");

        return Ok(Json(json!({
            "reference_key": key,
            "filename": filename,
        })));
    }

    Err(ApiError::bad_request("Missing multipart field 'file'"))
}

/// `GET /api/reference/{key}` - play back a previously uploaded clip.
pub async fn download(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response<Body>, ApiError> {
    let bytes = state.engine.fetch_reference(&key)?;

    Response::builder()
        .header(header::CONTENT_TYPE, "audio/wav")
        .body(Body::from(bytes.as_ref().clone()))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}
