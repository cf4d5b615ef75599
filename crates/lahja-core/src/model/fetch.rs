//! Artifact downloads from the Hugging Face Hub.
//!
//! Blocking by design: pulls are driven by the CLI, never implicitly by the
//! server. A missing bundle at request time stays a retryable `LoadError`.

use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::catalog::Dialect;
use crate::error::{Error, Result};
use crate::model::artifacts::{ArtifactStore, REMOTE_FILES};

const HF_BASE_URL: &str = "https://huggingface.co";

/// Downloads a dialect's artifact bundle into the models dir.
pub struct ArtifactFetcher {
    client: Client,
    store: ArtifactStore,
    show_progress: bool,
}

impl ArtifactFetcher {
    pub fn new(store: ArtifactStore) -> Result<Self> {
        std::fs::create_dir_all(store.models_dir())?;

        let client = Client::builder()
            // Checkpoint files run into the gigabytes.
            .timeout(Duration::from_secs(3600))
            .user_agent(concat!("lahja/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Download(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            store,
            show_progress: true,
        })
    }

    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Download every missing file of the dialect's bundle. Files already on
    /// disk (under either the v2 or the alias name) are left untouched.
    pub fn pull(&self, dialect: Dialect) -> Result<PathBuf> {
        let dir = self.store.dialect_dir(dialect);
        std::fs::create_dir_all(&dir)?;

        info!(dialect = %dialect, repo = dialect.repo_id(), "Pulling artifact bundle");

        for filename in REMOTE_FILES {
            let bundle = self.store.bundle(dialect);
            let already_present = [
                &bundle.t3_weights,
                &bundle.s3gen_weights,
                &bundle.voice_encoder,
                &bundle.default_conditioning,
                &bundle.tokenizer,
            ]
            .iter()
            .any(|path| {
                path.file_name().map(|n| n == filename).unwrap_or(false) && path.exists()
            });
            if already_present || dir.join(filename).exists() {
                debug!(filename, "Already downloaded, skipping");
                continue;
            }

            self.download_file(dialect.repo_id(), filename, dialect)?;
        }

        self.store.verify(dialect)?;
        info!(dialect = %dialect, "Bundle complete and verified");
        Ok(dir)
    }

    fn download_file(&self, repo_id: &str, filename: &str, dialect: Dialect) -> Result<()> {
        let url = format!("{}/{}/resolve/main/{}", HF_BASE_URL, repo_id, filename);
        debug!(url = %url, "Downloading");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| Error::Download(format!("Request for {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::Download(format!(
                "HTTP {} for {}",
                response.status(),
                url
            )));
        }

        let total = response.content_length().unwrap_or(0);
        let progress = if self.show_progress {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template(
                    "{msg:<30} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
            );
            bar.set_message(filename.to_string());
            bar
        } else {
            ProgressBar::hidden()
        };

        // Write to a temp name first so a cut connection never leaves a
        // truncated file that passes the presence check.
        let dest = self.store.dialect_dir(dialect).join(filename);
        let partial = dest.with_extension("partial");
        let mut file = File::create(&partial)?;

        let mut reader = progress.wrap_read(response);
        std::io::copy(&mut reader, &mut file)
            .map_err(|e| Error::Download(format!("Failed writing {}: {}", filename, e)))?;
        progress.finish_and_clear();

        std::fs::rename(&partial, &dest)?;
        info!(filename, bytes = total, "Downloaded");
        Ok(())
    }
}
