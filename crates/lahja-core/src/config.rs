//! Configuration types for the lahja TTS engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding one artifact bundle per dialect.
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Directory holding the bundled training-sample clips.
    #[serde(default = "default_samples_dir")]
    pub samples_dir: PathBuf,

    /// Device preference ("cuda", "metal", "cpu"); autodetect when unset.
    #[serde(default)]
    pub device: Option<String>,

    /// Run the best-effort graph compilation pass after each load.
    #[serde(default = "default_compile_models")]
    pub compile_models: bool,

    /// Serialize synthesis calls per loaded model. The daemon runtime
    /// handles one generation at a time, so this defaults to on.
    #[serde(default = "default_serialize_synthesis")]
    pub serialize_synthesis: bool,

    /// Upper bound on request text length, in characters.
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    /// Unix socket the synthesis daemon listens on.
    #[serde(default = "default_daemon_socket")]
    pub daemon_socket: PathBuf,

    /// Script that hosts the Python-resident model runtime.
    #[serde(default = "default_daemon_script")]
    pub daemon_script: PathBuf,

    /// Interpreter used to launch the daemon.
    #[serde(default = "default_python_cmd")]
    pub python_cmd: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            samples_dir: default_samples_dir(),
            device: None,
            compile_models: default_compile_models(),
            serialize_synthesis: default_serialize_synthesis(),
            max_text_chars: default_max_text_chars(),
            daemon_socket: default_daemon_socket(),
            daemon_script: default_daemon_script(),
            python_cmd: default_python_cmd(),
        }
    }
}

fn default_models_dir() -> PathBuf {
    if let Ok(from_env) = std::env::var("LAHJA_MODELS_DIR") {
        let trimmed = from_env.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lahja")
        .join("models")
}

fn default_samples_dir() -> PathBuf {
    if let Ok(from_env) = std::env::var("LAHJA_SAMPLES_DIR") {
        let trimmed = from_env.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    PathBuf::from("training_samples")
}

fn default_compile_models() -> bool {
    true
}

fn default_serialize_synthesis() -> bool {
    true
}

fn default_max_text_chars() -> usize {
    4000
}

fn default_daemon_socket() -> PathBuf {
    if let Ok(from_env) = std::env::var("LAHJA_DAEMON_SOCKET") {
        let trimmed = from_env.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    PathBuf::from("/tmp/lahja_tts_daemon.sock")
}

fn default_daemon_script() -> PathBuf {
    PathBuf::from("scripts/tts_daemon.py")
}

fn default_python_cmd() -> String {
    "python3".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_usable() {
        let config = EngineConfig::default();
        assert!(config.compile_models);
        assert!(config.serialize_synthesis);
        assert_eq!(config.max_text_chars, 4000);
        assert!(config.models_dir.ends_with("models") || config.models_dir.is_absolute());
    }

    #[test]
    fn config_deserializes_with_partial_fields() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"max_text_chars": 100, "compile_models": false}"#).unwrap();
        assert_eq!(config.max_text_chars, 100);
        assert!(!config.compile_models);
        assert!(config.serialize_synthesis);
    }
}
