//! Synthesis backend seam.
//!
//! The ChatterBox model graph is Python-resident; the core never touches
//! tensors directly. Everything behind this trait is exchangeable, which is
//! how the pipeline and cache tests run against a deterministic fake.

mod daemon;

use crate::catalog::Dialect;
use crate::error::Result;
use crate::model::{ArtifactBundle, DeviceKind};

pub use daemon::DaemonBackend;

/// Opaque handle to a model the backend has materialized.
///
/// For the daemon backend the token is the artifact directory the daemon
/// keyed its own cache on; fakes put whatever they like here.
#[derive(Debug, Clone)]
pub struct BackendModel {
    pub dialect: Dialect,
    pub token: String,
}

/// How a model should be materialized.
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub device: DeviceKind,
    /// Ask for the ahead-of-time compilation pass. Best-effort: a backend
    /// that cannot compile still reports a successful load.
    pub compile: bool,
}

/// A successful load plus whether the compilation pass actually took.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub model: BackendModel,
    pub compiled: bool,
}

/// One synthesis invocation. `inference_only` is always set by the
/// pipeline; no call on this path ever builds a training graph.
#[derive(Debug, Clone)]
pub struct SynthesisArgs {
    pub text: String,
    pub language_id: String,
    pub temperature: f32,
    pub repetition_penalty: f32,
    pub top_p: f32,
    pub min_p: f32,
    pub cfg_weight: f32,
    /// WAV bytes of the conditioning clip; `None` means the checkpoint's
    /// default conditioning embedding.
    pub reference_wav: Option<Vec<u8>>,
    pub inference_only: bool,
}

/// Raw synthesized waveform before WAV packaging.
#[derive(Debug, Clone)]
pub struct PcmAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl PcmAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// The seam between the request pipeline and the model runtime.
///
/// Methods block; callers run them on the blocking pool. Implementations
/// must tolerate concurrent calls — serialization of synthesis, when the
/// runtime needs it, is the cache's decision, not the backend's.
pub trait SynthesisBackend: Send + Sync + 'static {
    /// Materialize one dialect's model. Failures are retryable; nothing is
    /// cached on this side of the seam.
    fn load(&self, dialect: Dialect, bundle: &ArtifactBundle, opts: &LoadOptions)
        -> Result<LoadOutcome>;

    /// Run one synthesis call against a previously loaded model.
    fn synthesize(&self, model: &BackendModel, args: SynthesisArgs) -> Result<PcmAudio>;
}
