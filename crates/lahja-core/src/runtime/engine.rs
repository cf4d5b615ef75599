//! The generation pipeline: validate, resolve, synthesize, package.
//!
//! Per-request flow: `Received -> Validated -> ModelReady ->
//! (ReferenceResolved) -> Synthesizing -> Completed | Failed(kind)`. The
//! engine holds no cross-request mutable state of its own; the model cache
//! is the only shared-mutation point.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::audio;
use crate::backend::{DaemonBackend, SynthesisArgs, SynthesisBackend};
use crate::catalog::{parse_dialect, Dialect};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::model::ModelCache;
use crate::reference::ReferenceStore;
use crate::runtime::{DialectInfo, EngineHealth, GenerationRequest, GenerationResult};

/// The core TTS engine: dialect registry, model cache, reference store,
/// and the per-request pipeline over them.
pub struct TtsEngine {
    config: EngineConfig,
    cache: ModelCache,
    references: ReferenceStore,
}

impl TtsEngine {
    /// Engine backed by the sidecar synthesis daemon.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let backend = Arc::new(DaemonBackend::from_config(&config));
        Self::with_backend(config, backend)
    }

    /// Engine with an injected backend; this is the testing seam.
    pub fn with_backend(config: EngineConfig, backend: Arc<dyn SynthesisBackend>) -> Result<Self> {
        let cache = ModelCache::new(&config, backend);
        info!(
            device = %cache.device(),
            models_dir = ?config.models_dir,
            "TTS engine initialized"
        );

        Ok(Self {
            config,
            cache,
            references: ReferenceStore::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Synthesize speech for one request.
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult> {
        // Validation happens before any model work.
        let text = request.text.trim();
        if text.is_empty() {
            return Err(Error::Validation("Text must not be empty".to_string()));
        }
        let char_count = text.chars().count();
        if char_count > self.config.max_text_chars {
            return Err(Error::Validation(format!(
                "Text is {} characters, maximum is {}",
                char_count, self.config.max_text_chars
            )));
        }

        let dialect = parse_dialect(&request.dialect)
            .map_err(|e| Error::Validation(e.to_string()))?;

        request.params.validate()?;
        if request.params.below_recommended_floor() {
            warn!(
                dialect = %dialect,
                repetition_penalty = request.params.repetition_penalty,
                "Repetition penalty below the recommended floor of 2.0; \
                 output may repeat"
            );
        }

        let model = self.cache.get_or_load(dialect).await?;

        // The default conditioning embedding ships with the checkpoint, so
        // no reference clip means no bytes on the wire.
        let reference_wav = match &request.reference_key {
            Some(key) => Some(self.references.fetch(key)?.as_ref().clone()),
            None => None,
        };

        let args = SynthesisArgs {
            text: normalize_text(text),
            language_id: dialect.language_id().to_string(),
            temperature: request.params.temperature,
            repetition_penalty: request.params.repetition_penalty,
            top_p: request.params.top_p,
            min_p: request.params.min_p,
            cfg_weight: request.params.cfg_weight,
            reference_wav,
            inference_only: true,
        };

        info!(
            dialect = %dialect,
            chars = char_count,
            with_reference = request.reference_key.is_some(),
            "Synthesizing"
        );

        let _guard = model.synthesis_guard().await;
        let backend = self.cache.backend();
        let model_for_task = model.clone();

        let started = Instant::now();
        let pcm = tokio::task::spawn_blocking(move || {
            backend.synthesize(model_for_task.handle(), args)
        })
        .await
        .map_err(|e| Error::Synthesis(format!("Synthesis task panicked: {}", e)))??;
        let elapsed_seconds = started.elapsed().as_secs_f64();

        let audio_seconds = pcm.duration_secs();
        let wav_bytes = audio::encode_wav_bytes(&pcm.samples, pcm.sample_rate)?;

        let result = GenerationResult {
            wav_bytes,
            sample_rate: pcm.sample_rate,
            elapsed_seconds,
            audio_seconds,
        };
        info!(
            dialect = %dialect,
            elapsed_secs = elapsed_seconds,
            audio_secs = audio_seconds,
            rtf = result.rtf(),
            "Synthesis complete"
        );
        Ok(result)
    }

    /// Warm a dialect's model ahead of the first request.
    pub async fn preload(&self, dialect: Dialect) -> Result<()> {
        self.cache.get_or_load(dialect).await?;
        Ok(())
    }

    /// Store an uploaded conditioning clip, returning its key.
    pub fn upload_reference(&self, wav_bytes: Vec<u8>) -> Result<String> {
        self.references.store(wav_bytes)
    }

    /// Raw bytes of a stored clip, for serving it back to clients.
    pub fn fetch_reference(&self, key: &str) -> Result<Arc<Vec<u8>>> {
        self.references.fetch(key)
    }

    /// The registry as `{id, label}` pairs.
    pub fn list_variants(&self) -> Vec<DialectInfo> {
        Dialect::all()
            .iter()
            .map(|d| DialectInfo {
                id: d.id(),
                label: d.display_name(),
            })
            .collect()
    }

    pub async fn health(&self) -> EngineHealth {
        EngineHealth {
            status: "healthy",
            models_loaded: self
                .cache
                .loaded_dialects()
                .await
                .iter()
                .map(|d| d.id().to_string())
                .collect(),
            device: self.cache.device().to_string(),
        }
    }
}

/// Collapse runs of whitespace; the tokenizer is sensitive to stray
/// newlines pasted in from documents.
fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{encode_wav_bytes, OUTPUT_SAMPLE_RATE};
    use crate::backend::{BackendModel, LoadOptions, LoadOutcome, PcmAudio};
    use crate::model::ArtifactBundle;
    use crate::runtime::GenerationParams;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeBackend {
        loads: AtomicUsize,
        syntheses: AtomicUsize,
        fail_synthesis: AtomicBool,
        saw_reference: AtomicBool,
    }

    impl FakeBackend {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                loads: AtomicUsize::new(0),
                syntheses: AtomicUsize::new(0),
                fail_synthesis: AtomicBool::new(false),
                saw_reference: AtomicBool::new(false),
            })
        }
    }

    impl SynthesisBackend for FakeBackend {
        fn load(
            &self,
            dialect: Dialect,
            bundle: &ArtifactBundle,
            opts: &LoadOptions,
        ) -> Result<LoadOutcome> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(LoadOutcome {
                model: BackendModel {
                    dialect,
                    token: bundle.dir.to_string_lossy().to_string(),
                },
                compiled: opts.compile,
            })
        }

        fn synthesize(&self, _model: &BackendModel, args: SynthesisArgs) -> Result<PcmAudio> {
            self.syntheses.fetch_add(1, Ordering::SeqCst);
            assert!(args.inference_only);
            if args.reference_wav.is_some() {
                self.saw_reference.store(true, Ordering::SeqCst);
            }
            if self.fail_synthesis.load(Ordering::SeqCst) {
                return Err(Error::Synthesis("injected numeric failure".to_string()));
            }
            let samples: Vec<f32> = (0..2400).map(|i| (i as f32 * 0.02).sin() * 0.4).collect();
            Ok(PcmAudio {
                samples,
                sample_rate: 24_000,
            })
        }
    }

    fn test_engine(backend: Arc<FakeBackend>) -> TtsEngine {
        let config = EngineConfig {
            device: Some("cpu".to_string()),
            ..EngineConfig::default()
        };
        TtsEngine::with_backend(config, backend).unwrap()
    }

    fn test_clip() -> Vec<u8> {
        let samples: Vec<f32> = (0..1200).map(|i| (i as f32 * 0.03).sin() * 0.5).collect();
        encode_wav_bytes(&samples, OUTPUT_SAMPLE_RATE).unwrap()
    }

    #[tokio::test]
    async fn arabic_request_yields_wav_and_nonnegative_elapsed() {
        let backend = FakeBackend::new();
        let engine = test_engine(backend.clone());

        let result = engine
            .generate(GenerationRequest::new("مرحبا", "egyptian"))
            .await
            .unwrap();

        assert!(!result.wav_bytes.is_empty());
        assert_eq!(&result.wav_bytes[..4], b"RIFF");
        assert!(result.elapsed_seconds >= 0.0);
        assert!(result.audio_seconds > 0.0);
        assert_eq!(backend.syntheses.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_text_fails_validation_without_touching_the_cache() {
        let backend = FakeBackend::new();
        let engine = test_engine(backend.clone());

        let err = engine
            .generate(GenerationRequest::new("   ", "egyptian"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(backend.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn overlong_text_fails_validation_without_touching_the_cache() {
        let backend = FakeBackend::new();
        let engine = test_engine(backend.clone());

        let text = "م".repeat(engine.config().max_text_chars + 1);
        let err = engine
            .generate(GenerationRequest::new(text, "egyptian"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(backend.loads.load(Ordering::SeqCst), 0);

        // Exactly at the bound is still accepted.
        let text = "م".repeat(engine.config().max_text_chars);
        engine
            .generate(GenerationRequest::new(text, "egyptian"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_dialect_fails_validation_without_touching_the_cache() {
        let backend = FakeBackend::new();
        let engine = test_engine(backend.clone());

        let err = engine
            .generate(GenerationRequest::new("hi", "atlantean"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(backend.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn out_of_range_params_never_reach_the_model() {
        let backend = FakeBackend::new();
        let engine = test_engine(backend.clone());

        let request = GenerationRequest::new("مرحبا", "ksa").with_params(GenerationParams {
            temperature: 1.51,
            ..Default::default()
        });
        let err = engine.generate(request).await.unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(backend.loads.load(Ordering::SeqCst), 0);
        assert_eq!(backend.syntheses.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn boundary_parameters_are_accepted() {
        let backend = FakeBackend::new();
        let engine = test_engine(backend);

        for temperature in [0.1, 1.5] {
            let request =
                GenerationRequest::new("مرحبا", "emirates").with_params(GenerationParams {
                    temperature,
                    ..Default::default()
                });
            engine.generate(request).await.unwrap();
        }
    }

    #[tokio::test]
    async fn uploaded_reference_is_resolvable_by_generate() {
        let backend = FakeBackend::new();
        let engine = test_engine(backend.clone());

        let key = engine.upload_reference(test_clip()).unwrap();
        engine
            .generate(GenerationRequest::new("مرحبا", "kuwaiti").with_reference(&key))
            .await
            .unwrap();
        assert!(backend.saw_reference.load(Ordering::SeqCst));
    }

    #[test]
    fn uploaded_reference_bytes_are_served_back_verbatim() {
        let backend = FakeBackend::new();
        let engine = test_engine(backend);

        let clip = test_clip();
        let key = engine.upload_reference(clip.clone()).unwrap();
        assert_eq!(*engine.fetch_reference(&key).unwrap(), clip);
        assert!(matches!(
            engine.fetch_reference("ref_nope.wav"),
            Err(Error::ReferenceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn unknown_reference_key_is_reference_not_found() {
        let backend = FakeBackend::new();
        let engine = test_engine(backend.clone());

        let err = engine
            .generate(GenerationRequest::new("مرحبا", "kuwaiti").with_reference("ref_nope.wav"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ReferenceNotFound(_)));
        // The model was resolved before the reference; the load stands.
        assert_eq!(backend.syntheses.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn model_failure_surfaces_as_synthesis_error_and_cache_survives() {
        let backend = FakeBackend::new();
        let engine = test_engine(backend.clone());

        backend.fail_synthesis.store(true, Ordering::SeqCst);
        let err = engine
            .generate(GenerationRequest::new("مرحبا", "egyptian"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Synthesis(_)));

        backend.fail_synthesis.store(false, Ordering::SeqCst);
        engine
            .generate(GenerationRequest::new("مرحبا", "egyptian"))
            .await
            .unwrap();
        assert_eq!(backend.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn repeated_requests_reuse_one_loaded_model() {
        let backend = FakeBackend::new();
        let engine = Arc::new(test_engine(backend.clone()));

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    engine.generate(GenerationRequest::new("مرحبا", "ksa")).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(backend.loads.load(Ordering::SeqCst), 1);
        assert_eq!(backend.syntheses.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn health_reflects_loaded_models() {
        let backend = FakeBackend::new();
        let engine = test_engine(backend);

        assert!(engine.health().await.models_loaded.is_empty());

        engine.preload(Dialect::Emirates).await.unwrap();
        let health = engine.health().await;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.models_loaded, vec!["emirates"]);
        assert_eq!(health.device, "cpu");
    }

    #[test]
    fn registry_listing_has_all_four_dialects() {
        let backend = FakeBackend::new();
        let engine = test_engine(backend);

        let variants = engine.list_variants();
        assert_eq!(variants.len(), 4);
        assert!(variants.iter().any(|v| v.id == "egyptian"));
    }

    #[test]
    fn whitespace_runs_collapse_in_text_normalization() {
        assert_eq!(normalize_text("  مرحبا \n  بكم  "), "مرحبا بكم");
    }
}
