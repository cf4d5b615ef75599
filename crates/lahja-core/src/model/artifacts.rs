//! On-disk artifact bundles for the dialect checkpoints.
//!
//! Each dialect directory holds five files: the T3 text-to-speech
//! transformer, the S3Gen speech generator, the voice encoder, the default
//! conditioning embedding, and the grapheme tokenizer. The fine-tuned
//! checkpoints ship under v2 filenames but older local copies may still use
//! the alias names, so resolution accepts both.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use safetensors::SafeTensors;
use tracing::debug;

use crate::catalog::Dialect;
use crate::error::{Error, Result};

/// Rows in the T3 text embedding table of the fine-tuned checkpoints.
///
/// The stock 23-language ChatterBox checkpoint carries 2352 rows; the
/// Genarabia fine-tunes expand the grapheme vocabulary to 2454. Verifying
/// this catches the easy mistake of pointing the models dir at a base
/// checkpoint.
pub const EXPANDED_TEXT_VOCAB: usize = 2454;

const T3_WEIGHTS: (&str, &str) = ("t3_mtl23ls_v2.safetensors", "t3_23lang.safetensors");
const S3GEN_WEIGHTS: &str = "s3gen.pt";
const VOICE_ENCODER: &str = "ve.pt";
const DEFAULT_CONDITIONING: &str = "conds.pt";
const TOKENIZER: (&str, &str) = (
    "grapheme_mtl_merged_expanded_v1.json",
    "mtl_tokenizer.json",
);

/// Filenames requested from the Hub repo when pulling a bundle.
pub(crate) const REMOTE_FILES: [&str; 5] = [
    T3_WEIGHTS.0,
    S3GEN_WEIGHTS,
    VOICE_ENCODER,
    DEFAULT_CONDITIONING,
    TOKENIZER.0,
];

/// Resolved file paths for one dialect's artifact bundle.
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub dir: PathBuf,
    pub t3_weights: PathBuf,
    pub s3gen_weights: PathBuf,
    pub voice_encoder: PathBuf,
    pub default_conditioning: PathBuf,
    pub tokenizer: PathBuf,
}

impl ArtifactBundle {
    fn files(&self) -> [(&'static str, &Path); 5] {
        [
            ("t3 transformer", &self.t3_weights),
            ("s3gen speech generator", &self.s3gen_weights),
            ("voice encoder", &self.voice_encoder),
            ("default conditioning", &self.default_conditioning),
            ("tokenizer", &self.tokenizer),
        ]
    }

    /// Labels of required files that are not present on disk.
    pub fn missing(&self) -> Vec<&'static str> {
        self.files()
            .iter()
            .filter(|(_, path)| !path.exists())
            .map(|(label, _)| *label)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

/// Verification outcome for a complete bundle.
#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub dialect: Dialect,
    pub text_vocab_rows: usize,
    pub tensor_count: usize,
}

/// Resolves dialect directories under a fixed models dir.
///
/// Resolution is pure path computation; existence is only checked by
/// `is_complete`/`verify` so the cache can surface a missing bundle as a
/// retryable `LoadError` at load time.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    models_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(models_dir: PathBuf) -> Self {
        Self { models_dir }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn dialect_dir(&self, dialect: Dialect) -> PathBuf {
        self.models_dir.join(dialect.dir_name())
    }

    /// Resolve the bundle paths, preferring the v2 filenames and falling
    /// back to the alias names when only those are on disk.
    pub fn bundle(&self, dialect: Dialect) -> ArtifactBundle {
        let dir = self.dialect_dir(dialect);
        ArtifactBundle {
            t3_weights: resolve_aliased(&dir, T3_WEIGHTS.0, T3_WEIGHTS.1),
            s3gen_weights: dir.join(S3GEN_WEIGHTS),
            voice_encoder: dir.join(VOICE_ENCODER),
            default_conditioning: dir.join(DEFAULT_CONDITIONING),
            tokenizer: resolve_aliased(&dir, TOKENIZER.0, TOKENIZER.1),
            dir,
        }
    }

    pub fn is_complete(&self, dialect: Dialect) -> bool {
        self.bundle(dialect).is_complete()
    }

    /// Check that every required file is present and that the T3 checkpoint
    /// carries the expanded text vocabulary.
    pub fn verify(&self, dialect: Dialect) -> Result<VerifyReport> {
        let bundle = self.bundle(dialect);

        let missing = bundle.missing();
        if !missing.is_empty() {
            return Err(Error::load(
                dialect,
                format!(
                    "Incomplete artifact bundle at {:?}: missing {}",
                    bundle.dir,
                    missing.join(", ")
                ),
            ));
        }

        let (rows, tensor_count) = read_text_vocab_rows(&bundle.t3_weights)
            .map_err(|e| Error::load(dialect, e.to_string()))?;

        if rows != EXPANDED_TEXT_VOCAB {
            return Err(Error::load(
                dialect,
                format!(
                    "T3 checkpoint at {:?} has a {}-row text embedding table, expected {} \
                     (this looks like a stock multilingual checkpoint, not a dialect fine-tune)",
                    bundle.t3_weights, rows, EXPANDED_TEXT_VOCAB
                ),
            ));
        }

        debug!(dialect = %dialect, tensor_count, "Artifact bundle verified");
        Ok(VerifyReport {
            dialect,
            text_vocab_rows: rows,
            tensor_count,
        })
    }
}

fn resolve_aliased(dir: &Path, primary: &str, alias: &str) -> PathBuf {
    let preferred = dir.join(primary);
    if preferred.exists() {
        return preferred;
    }
    let fallback = dir.join(alias);
    if fallback.exists() {
        return fallback;
    }
    preferred
}

/// Parse the safetensors header (only the header, never the tensor data)
/// and return the row count of the text embedding table plus the total
/// tensor count.
fn read_text_vocab_rows(path: &Path) -> Result<(usize, usize)> {
    let mut file = File::open(path)?;

    let mut len_buf = [0u8; 8];
    file.read_exact(&mut len_buf)?;
    let header_len = u64::from_le_bytes(len_buf) as usize;
    if header_len == 0 || header_len > 100 * 1024 * 1024 {
        return Err(Error::Validation(format!(
            "Implausible safetensors header length {} in {:?}",
            header_len, path
        )));
    }

    let mut buf = vec![0u8; 8 + header_len];
    buf[..8].copy_from_slice(&len_buf);
    file.read_exact(&mut buf[8..])?;

    let (_, metadata) = SafeTensors::read_metadata(&buf).map_err(|e| {
        Error::Validation(format!("Corrupt safetensors header in {:?}: {}", path, e))
    })?;

    let tensors = metadata.tensors();
    let tensor_count = tensors.len();
    let rows = tensors
        .iter()
        .find(|(name, _)| name.ends_with("text_emb.weight"))
        .and_then(|(_, info)| info.shape.first().copied())
        .ok_or_else(|| {
            Error::Validation(format!(
                "No text embedding tensor found in {:?}; not a T3 checkpoint",
                path
            ))
        })?;

    Ok((rows, tensor_count))
}
