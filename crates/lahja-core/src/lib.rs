//! Lahja Core - Arabic-dialect TTS engine
//!
//! This crate owns the model lifecycle and the generation-request pipeline
//! for the four supported Arabic dialect checkpoints (Egyptian, Emirati,
//! Saudi, Kuwaiti):
//!
//! - `catalog` - the closed dialect registry and the bundled sample listing
//! - `model` - artifact resolution/verification, downloads, and the
//!   single-flight model cache
//! - `backend` - the synthesis seam (daemon-resident model runtime)
//! - `reference` - uploaded voice-conditioning clips
//! - `runtime` - the per-request generation pipeline
//!
//! # Example
//!
//! ```ignore
//! use lahja_core::{EngineConfig, GenerationRequest, TtsEngine};
//!
//! let engine = TtsEngine::new(EngineConfig::default())?;
//! let result = engine.generate(GenerationRequest::new("مرحبا", "egyptian")).await?;
//! std::fs::write("out.wav", &result.wav_bytes)?;
//! ```

pub mod audio;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod model;
pub mod reference;
pub mod runtime;

pub use backend::{
    BackendModel, DaemonBackend, LoadOptions, LoadOutcome, PcmAudio, SynthesisArgs,
    SynthesisBackend,
};
pub use catalog::{find_sample, parse_dialect, samples_for, Dialect, SampleInfo};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use model::{
    ArtifactBundle, ArtifactFetcher, ArtifactStore, DeviceKind, DeviceSelector, LoadedModel,
    ModelCache, VerifyReport,
};
pub use reference::ReferenceStore;
pub use runtime::{
    DialectInfo, EngineHealth, GenerationParams, GenerationRequest, GenerationResult, TtsEngine,
    REPETITION_PENALTY_FLOOR,
};
