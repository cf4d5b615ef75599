//! Request and result types at the engine boundary.

use serde::{Deserialize, Serialize};

use crate::runtime::GenerationParams;

/// One synthesis request.
///
/// The dialect stays a raw string here so an unknown identifier surfaces
/// as a validation error inside the pipeline, before the model cache is
/// ever touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub text: String,
    pub dialect: String,
    #[serde(default)]
    pub params: GenerationParams,
    /// Key of an uploaded reference clip; `None` uses the checkpoint's
    /// default conditioning embedding.
    #[serde(default)]
    pub reference_key: Option<String>,
}

impl GenerationRequest {
    pub fn new(text: impl Into<String>, dialect: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            dialect: dialect.into(),
            params: GenerationParams::default(),
            reference_key: None,
        }
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_reference(mut self, key: impl Into<String>) -> Self {
        self.reference_key = Some(key.into());
        self
    }
}

/// Synthesized audio plus timing.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// Mono 16-bit PCM WAV, peak-normalized.
    pub wav_bytes: Vec<u8>,
    pub sample_rate: u32,
    /// Wall-clock seconds spent inside the synthesis call.
    pub elapsed_seconds: f64,
    /// Duration of the synthesized audio.
    pub audio_seconds: f64,
}

impl GenerationResult {
    /// Real-time factor: audio seconds produced per second of synthesis.
    pub fn rtf(&self) -> f64 {
        if self.elapsed_seconds <= 0.0 {
            return 0.0;
        }
        self.audio_seconds / self.elapsed_seconds
    }
}

/// One registry entry as exposed to clients.
#[derive(Debug, Clone, Serialize)]
pub struct DialectInfo {
    pub id: &'static str,
    pub label: &'static str,
}

/// Engine health snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct EngineHealth {
    pub status: &'static str,
    pub models_loaded: Vec<String>,
    pub device: String,
}
