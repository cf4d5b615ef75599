//! Shared application state.

use std::sync::Arc;

use lahja_core::TtsEngine;
use tokio::sync::Semaphore;

/// State handed to every handler: the engine plus backpressure knobs.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TtsEngine>,
    /// Caps in-flight generations; synthesis is memory-hungry.
    pub request_semaphore: Arc<Semaphore>,
    pub request_timeout_secs: u64,
}

impl AppState {
    pub fn new(engine: TtsEngine) -> Self {
        let max_concurrent = std::env::var("LAHJA_MAX_CONCURRENT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2);

        let timeout = std::env::var("LAHJA_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(300);

        Self {
            engine: Arc::new(engine),
            request_semaphore: Arc::new(Semaphore::new(max_concurrent)),
            request_timeout_secs: timeout,
        }
    }

    pub async fn acquire_permit(&self) -> tokio::sync::SemaphorePermit<'_> {
        self.request_semaphore
            .acquire()
            .await
            .expect("Semaphore should never be closed")
    }
}
