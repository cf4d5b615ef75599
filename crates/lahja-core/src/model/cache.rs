//! Single-flight model cache.
//!
//! At most one materialized model per dialect, loaded lazily on first
//! request. Concurrent first-requests collapse into a single backend load;
//! a failed load is never cached, so a transient storage problem heals on
//! the next call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{info, warn};

use crate::backend::{BackendModel, LoadOptions, SynthesisBackend};
use crate::catalog::Dialect;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::model::{ArtifactStore, DeviceKind, DeviceSelector};

/// Handle to one dialect's materialized model.
#[derive(Debug)]
pub struct LoadedModel {
    pub dialect: Dialect,
    pub device: DeviceKind,
    /// Whether the ahead-of-time compilation pass took. Purely a
    /// capability flag; an uncompiled model serves requests the same way.
    pub compiled: bool,
    pub loaded_at: SystemTime,
    handle: BackendModel,
    synthesis_lock: Option<Mutex<()>>,
}

impl LoadedModel {
    pub fn handle(&self) -> &BackendModel {
        &self.handle
    }

    /// Serialize synthesis on this model when the deployment asked for it.
    pub async fn synthesis_guard(&self) -> Option<MutexGuard<'_, ()>> {
        match &self.synthesis_lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        }
    }
}

struct Slot {
    init: Mutex<()>,
    loaded: RwLock<Option<Arc<LoadedModel>>>,
}

/// Process-scoped cache of loaded models, one slot per dialect.
///
/// Constructed once at startup and passed by reference into the pipeline;
/// there is no ambient global.
pub struct ModelCache {
    backend: Arc<dyn SynthesisBackend>,
    artifacts: ArtifactStore,
    device: DeviceKind,
    compile_models: bool,
    serialize_synthesis: bool,
    slots: RwLock<HashMap<Dialect, Arc<Slot>>>,
}

impl ModelCache {
    pub fn new(config: &EngineConfig, backend: Arc<dyn SynthesisBackend>) -> Self {
        // One device policy per process, shared by every dialect.
        let device = DeviceSelector::detect_with_preference(config.device.as_deref());

        Self {
            backend,
            artifacts: ArtifactStore::new(config.models_dir.clone()),
            device,
            compile_models: config.compile_models,
            serialize_synthesis: config.serialize_synthesis,
            slots: RwLock::new(HashMap::new()),
        }
    }

    pub fn device(&self) -> DeviceKind {
        self.device
    }

    pub fn backend(&self) -> Arc<dyn SynthesisBackend> {
        self.backend.clone()
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Return the cached model for a dialect, loading it first if needed.
    ///
    /// Double-checked: the fast path is a read on the slot; on a miss the
    /// per-dialect init lock is taken and the slot re-checked, so N
    /// concurrent first-requests trigger exactly one backend load.
    pub async fn get_or_load(&self, dialect: Dialect) -> Result<Arc<LoadedModel>> {
        let slot = self.slot(dialect).await;

        if let Some(model) = slot.loaded.read().await.clone() {
            return Ok(model);
        }

        let _init = slot.init.lock().await;
        if let Some(model) = slot.loaded.read().await.clone() {
            return Ok(model);
        }

        let model = Arc::new(self.load_uncached(dialect).await?);
        *slot.loaded.write().await = Some(model.clone());
        Ok(model)
    }

    /// True when a dialect's model is materialized.
    pub async fn is_loaded(&self, dialect: Dialect) -> bool {
        match self.slots.read().await.get(&dialect) {
            Some(slot) => slot.loaded.read().await.is_some(),
            None => false,
        }
    }

    /// Dialect ids of every materialized model, in registry order.
    pub async fn loaded_dialects(&self) -> Vec<Dialect> {
        let mut out = Vec::new();
        for dialect in Dialect::all() {
            if self.is_loaded(*dialect).await {
                out.push(*dialect);
            }
        }
        out
    }

    async fn slot(&self, dialect: Dialect) -> Arc<Slot> {
        if let Some(slot) = self.slots.read().await.get(&dialect) {
            return slot.clone();
        }

        let mut slots = self.slots.write().await;
        slots
            .entry(dialect)
            .or_insert_with(|| {
                Arc::new(Slot {
                    init: Mutex::new(()),
                    loaded: RwLock::new(None),
                })
            })
            .clone()
    }

    /// Run the backend load on the blocking pool. Called with the init
    /// lock held; errors propagate without touching the slot.
    async fn load_uncached(&self, dialect: Dialect) -> Result<LoadedModel> {
        info!(dialect = %dialect, device = %self.device, "Loading model");
        let started = std::time::Instant::now();

        let backend = self.backend.clone();
        let bundle = self.artifacts.bundle(dialect);
        let opts = LoadOptions {
            device: self.device,
            compile: self.compile_models,
        };

        let outcome = tokio::task::spawn_blocking(move || backend.load(dialect, &bundle, &opts))
            .await
            .map_err(|e| Error::load(dialect, format!("Load task panicked: {}", e)))?
            .map_err(|e| match e {
                load @ Error::Load { .. } => load,
                other => Error::load(dialect, other.to_string()),
            })?;

        if self.compile_models && !outcome.compiled {
            warn!(dialect = %dialect, "Model loaded without compilation pass");
        }
        info!(
            dialect = %dialect,
            compiled = outcome.compiled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Model ready"
        );

        Ok(LoadedModel {
            dialect,
            device: self.device,
            compiled: outcome.compiled,
            loaded_at: SystemTime::now(),
            handle: outcome.model,
            synthesis_lock: self.serialize_synthesis.then(|| Mutex::new(())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LoadOutcome, PcmAudio, SynthesisArgs};
    use crate::model::ArtifactBundle;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Backend fake: counts loads, optionally fails or stalls them.
    struct FakeBackend {
        loads: AtomicUsize,
        fail_next_load: AtomicBool,
        refuse_compile: bool,
        load_delay: Duration,
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                loads: AtomicUsize::new(0),
                fail_next_load: AtomicBool::new(false),
                refuse_compile: false,
                load_delay: Duration::ZERO,
            }
        }

        fn load_count(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
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
            if !self.load_delay.is_zero() {
                std::thread::sleep(self.load_delay);
            }
            if self.fail_next_load.swap(false, Ordering::SeqCst) {
                return Err(Error::load(dialect, "injected artifact failure"));
            }
            Ok(LoadOutcome {
                model: BackendModel {
                    dialect,
                    token: bundle.dir.to_string_lossy().to_string(),
                },
                compiled: opts.compile && !self.refuse_compile,
            })
        }

        fn synthesize(&self, _model: &BackendModel, _args: SynthesisArgs) -> Result<PcmAudio> {
            Ok(PcmAudio {
                samples: vec![0.1; 240],
                sample_rate: 24_000,
            })
        }
    }

    fn test_config() -> EngineConfig {
        EngineConfig {
            device: Some("cpu".to_string()),
            ..EngineConfig::default()
        }
    }

    fn cache_with(backend: Arc<FakeBackend>) -> ModelCache {
        ModelCache::new(&test_config(), backend)
    }

    #[tokio::test]
    async fn second_load_reuses_the_cached_instance() {
        let backend = Arc::new(FakeBackend::new());
        let cache = cache_with(backend.clone());

        let first = cache.get_or_load(Dialect::Egyptian).await.unwrap();
        let second = cache.get_or_load(Dialect::Egyptian).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(backend.load_count(), 1);
        assert!(cache.is_loaded(Dialect::Egyptian).await);
        assert!(!cache.is_loaded(Dialect::Ksa).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_requests_collapse_into_one_load() {
        let backend = Arc::new(FakeBackend {
            load_delay: Duration::from_millis(50),
            ..FakeBackend::new()
        });
        let cache = Arc::new(cache_with(backend.clone()));

        let results =
            futures::future::join_all((0..8).map(|_| cache.get_or_load(Dialect::Kuwaiti))).await;

        for result in results {
            result.unwrap();
        }
        assert_eq!(backend.load_count(), 1);
    }

    #[tokio::test]
    async fn a_failed_load_is_retried_not_cached() {
        let backend = Arc::new(FakeBackend::new());
        backend.fail_next_load.store(true, Ordering::SeqCst);
        let cache = cache_with(backend.clone());

        let err = cache.get_or_load(Dialect::Emirates).await.unwrap_err();
        assert!(matches!(err, Error::Load { .. }));
        assert!(!cache.is_loaded(Dialect::Emirates).await);

        // Second attempt hits the backend again and succeeds.
        cache.get_or_load(Dialect::Emirates).await.unwrap();
        assert_eq!(backend.load_count(), 2);
    }

    #[tokio::test]
    async fn compile_refusal_downgrades_instead_of_failing() {
        let backend = Arc::new(FakeBackend {
            refuse_compile: true,
            ..FakeBackend::new()
        });
        let cache = cache_with(backend);

        let model = cache.get_or_load(Dialect::Ksa).await.unwrap();
        assert!(!model.compiled);
        assert_eq!(model.device, DeviceKind::Cpu);
    }

    #[tokio::test]
    async fn loaded_dialects_follow_registry_order() {
        let backend = Arc::new(FakeBackend::new());
        let cache = cache_with(backend);

        cache.get_or_load(Dialect::Kuwaiti).await.unwrap();
        cache.get_or_load(Dialect::Egyptian).await.unwrap();

        assert_eq!(
            cache.loaded_dialects().await,
            vec![Dialect::Egyptian, Dialect::Kuwaiti]
        );
    }

    #[tokio::test]
    async fn synthesis_guard_is_present_only_when_configured() {
        let backend = Arc::new(FakeBackend::new());
        let serialized = cache_with(backend.clone());
        let model = serialized.get_or_load(Dialect::Egyptian).await.unwrap();
        assert!(model.synthesis_guard().await.is_some());

        let config = EngineConfig {
            serialize_synthesis: false,
            ..test_config()
        };
        let parallel = ModelCache::new(&config, backend);
        let model = parallel.get_or_load(Dialect::Egyptian).await.unwrap();
        assert!(model.synthesis_guard().await.is_none());
    }
}
