//! Registry listing, bundled samples, and health endpoints.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Response};
use axum::Json;
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;
use lahja_core::{find_sample, parse_dialect, samples_for, Dialect};

/// `GET /api/dialects` - ids plus display labels.
pub async fn dialects(State(state): State<AppState>) -> Json<serde_json::Value> {
    let variants = state.engine.list_variants();
    let ids: Vec<&str> = variants.iter().map(|v| v.id).collect();
    let display_names: serde_json::Map<String, serde_json::Value> = variants
        .iter()
        .map(|v| (v.id.to_string(), json!(v.label)))
        .collect();

    Json(json!({
        "dialects": ids,
        "display_names": display_names,
    }))
}

/// `GET /api/samples` - the bundled training-sample catalog by dialect.
pub async fn samples() -> Json<serde_json::Value> {
    let by_dialect: serde_json::Map<String, serde_json::Value> = Dialect::all()
        .iter()
        .map(|d| (d.id().to_string(), json!(samples_for(*d))))
        .collect();
    Json(json!(by_dialect))
}

/// `GET /api/samples/{dialect}/{sample_id}` - one training clip as WAV.
pub async fn sample_audio(
    State(state): State<AppState>,
    Path((dialect, sample_id)): Path<(String, String)>,
) -> Result<Response<Body>, ApiError> {
    let dialect = parse_dialect(&dialect).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let sample = find_sample(dialect, &sample_id)
        .ok_or_else(|| ApiError::not_found(format!("Unknown sample '{}'", sample_id)))?;

    let path = state
        .engine
        .config()
        .samples_dir
        .join(dialect.id())
        .join(sample.filename);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::not_found(format!("Sample audio missing: {:?}", path)))?;

    Response::builder()
        .header(header::CONTENT_TYPE, "audio/wav")
        .body(Body::from(bytes))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}

/// `GET /health` and `GET /api/health`.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!(state.engine.health().await))
}
