//! Per-request generation pipeline and its request/result types.

mod engine;
mod params;
mod types;

pub use engine::TtsEngine;
pub use params::{GenerationParams, REPETITION_PENALTY_FLOOR};
pub use types::{DialectInfo, EngineHealth, GenerationRequest, GenerationResult};
