//! Model lifecycle: artifact resolution and verification, Hub downloads,
//! device placement, and the single-flight in-memory cache.

mod artifacts;
mod cache;
mod device;
mod fetch;

pub use artifacts::{ArtifactBundle, ArtifactStore, VerifyReport, EXPANDED_TEXT_VOCAB};
pub use cache::{LoadedModel, ModelCache};
pub use device::{DeviceKind, DeviceSelector, WEIGHTS_DTYPE};
pub use fetch::ArtifactFetcher;
