//! In-memory store for uploaded voice-conditioning clips.
//!
//! Clips live for the lifetime of the process; there is no deduplication or
//! eviction. Keys are opaque generated names, never client paths.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::info;
use uuid::Uuid;

use crate::audio;
use crate::error::{Error, Result};

/// Keyed storage for reference audio used to condition synthesis.
#[derive(Default)]
pub struct ReferenceStore {
    clips: RwLock<HashMap<String, Arc<Vec<u8>>>>,
}

impl ReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store an uploaded clip, returning its key.
    ///
    /// Only decodable WAV payloads are accepted; multi-channel audio is fine
    /// since the pipeline downmixes before conditioning.
    pub fn store(&self, wav_bytes: Vec<u8>) -> Result<String> {
        let (samples, sample_rate) = audio::decode_wav_bytes(&wav_bytes)?;

        let key = format!("ref_{}.wav", &Uuid::new_v4().simple().to_string()[..8]);
        info!(
            key = %key,
            samples = samples.len(),
            sample_rate,
            "Stored reference clip"
        );

        let mut clips = self.clips.write().unwrap();
        clips.insert(key.clone(), Arc::new(wav_bytes));
        Ok(key)
    }

    /// Fetch a stored clip by key.
    pub fn fetch(&self, key: &str) -> Result<Arc<Vec<u8>>> {
        let clips = self.clips.read().unwrap();
        clips
            .get(key)
            .cloned()
            .ok_or_else(|| Error::ReferenceNotFound(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.clips.read().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.clips.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.read().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{encode_wav_bytes, OUTPUT_SAMPLE_RATE};

    fn test_clip() -> Vec<u8> {
        let samples: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.01).sin() * 0.5).collect();
        encode_wav_bytes(&samples, OUTPUT_SAMPLE_RATE).unwrap()
    }

    #[test]
    fn stored_clip_is_fetchable_by_its_key() {
        let store = ReferenceStore::new();
        let clip = test_clip();
        let key = store.store(clip.clone()).unwrap();

        assert!(key.starts_with("ref_"));
        assert!(key.ends_with(".wav"));
        assert_eq!(*store.fetch(&key).unwrap(), clip);
    }

    #[test]
    fn unknown_key_is_reference_not_found() {
        let store = ReferenceStore::new();
        let err = store.fetch("ref_missing.wav").unwrap_err();
        assert!(matches!(err, Error::ReferenceNotFound(_)));
    }

    #[test]
    fn non_audio_payload_is_rejected() {
        let store = ReferenceStore::new();
        let err = store.store(b"<html>not audio</html>".to_vec()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn keys_are_unique_per_upload() {
        let store = ReferenceStore::new();
        let a = store.store(test_clip()).unwrap();
        let b = store.store(test_clip()).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }
}
