//! TTS generation endpoints.

use axum::{
    body::Body,
    extract::State,
    http::{header, Response},
    Json,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;
use lahja_core::{find_sample, parse_dialect, GenerationParams, GenerationRequest};

/// Body of `POST /api/tts`. Omitted knobs take the engine defaults.
#[derive(Debug, Deserialize)]
pub struct TtsApiRequest {
    pub text: String,
    pub dialect: String,

    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub repetition_penalty: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub min_p: Option<f32>,
    #[serde(default)]
    pub cfg_weight: Option<f32>,

    /// Key returned by `/api/upload-reference`.
    #[serde(default)]
    pub reference_key: Option<String>,
}

impl TtsApiRequest {
    fn into_core_request(self) -> GenerationRequest {
        let defaults = GenerationParams::default();
        let params = GenerationParams {
            temperature: self.temperature.unwrap_or(defaults.temperature),
            repetition_penalty: self
                .repetition_penalty
                .unwrap_or(defaults.repetition_penalty),
            top_p: self.top_p.unwrap_or(defaults.top_p),
            min_p: self.min_p.unwrap_or(defaults.min_p),
            cfg_weight: self.cfg_weight.unwrap_or(defaults.cfg_weight),
        };

        let mut request = GenerationRequest::new(self.text, self.dialect).with_params(params);
        if let Some(key) = self.reference_key {
            request = request.with_reference(key);
        }
        request
    }
}

/// `POST /api/tts` - synthesize speech, reply with WAV bytes.
///
/// The measured synthesis time travels out-of-band in the
/// `X-Inference-Time` header.
pub async fn generate(
    State(state): State<AppState>,
    Json(req): Json<TtsApiRequest>,
) -> Result<Response<Body>, ApiError> {
    info!("TTS request: {} chars, dialect '{}'", req.text.len(), req.dialect);

    let _permit = state.acquire_permit().await;
    let timeout = Duration::from_secs(state.request_timeout_secs);

    let result = tokio::time::timeout(timeout, state.engine.generate(req.into_core_request()))
        .await
        .map_err(|_| ApiError::timeout("Request timeout"))??;

    wav_response(result.wav_bytes, result.elapsed_seconds)
}

/// Body of `POST /api/compare`.
#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub dialect: String,
    pub sample_id: String,
    /// Condition on the sample's own recording so the output can be
    /// compared voice-to-voice against the training clip.
    #[serde(default = "default_true")]
    pub use_sample_as_reference: bool,
}

fn default_true() -> bool {
    true
}

/// `POST /api/compare` - synthesize a bundled training sample's transcript,
/// optionally conditioned on the sample recording itself.
pub async fn compare(
    State(state): State<AppState>,
    Json(req): Json<CompareRequest>,
) -> Result<Response<Body>, ApiError> {
    let dialect =
        parse_dialect(&req.dialect).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let sample = find_sample(dialect, &req.sample_id)
        .ok_or_else(|| ApiError::not_found(format!("Unknown sample '{}'", req.sample_id)))?;

    let mut request = GenerationRequest::new(sample.text, dialect.id());

    if req.use_sample_as_reference {
        let path = state
            .engine
            .config()
            .samples_dir
            .join(dialect.id())
            .join(sample.filename);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| ApiError::not_found(format!("Sample audio missing: {:?}", path)))?;
        let key = state.engine.upload_reference(bytes)?;
        request = request.with_reference(key);
    }

    let _permit = state.acquire_permit().await;
    let timeout = Duration::from_secs(state.request_timeout_secs);
    let result = tokio::time::timeout(timeout, state.engine.generate(request))
        .await
        .map_err(|_| ApiError::timeout("Request timeout"))??;

    wav_response(result.wav_bytes, result.elapsed_seconds)
}

fn wav_response(wav_bytes: Vec<u8>, elapsed_seconds: f64) -> Result<Response<Body>, ApiError> {
    Response::builder()
        .header(header::CONTENT_TYPE, "audio/wav")
        .header("X-Inference-Time", format!("{:.3}", elapsed_seconds))
        .header(header::ACCESS_CONTROL_EXPOSE_HEADERS, "X-Inference-Time")
        .body(Body::from(wav_bytes))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}
