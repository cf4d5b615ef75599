//! Error types for the lahja TTS engine.

use thiserror::Error;

use crate::catalog::Dialect;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the core engine.
///
/// The four request-facing kinds map onto distinct caller behavior:
/// `Validation` never touches a model and is safe to report verbatim,
/// `Load` is retryable (a failed load is never cached), `ReferenceNotFound`
/// points at a stale or mistyped clip key, and `Synthesis` is an opaque
/// model-side failure whose detail belongs in the server log, not the reply.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Failed to load model for '{dialect}': {cause}")]
    Load { dialect: Dialect, cause: String },

    #[error("Reference clip not found: {0}")]
    ReferenceNotFound(String),

    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn load(dialect: Dialect, cause: impl Into<String>) -> Self {
        Self::Load {
            dialect,
            cause: cause.into(),
        }
    }
}
