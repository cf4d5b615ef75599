//! Daemon backend: talks to the persistent Python-resident model runtime
//! over a Unix socket with length-prefixed JSON frames.

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::time::Duration;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::audio;
use crate::catalog::Dialect;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::model::{ArtifactBundle, WEIGHTS_DTYPE};

use super::{BackendModel, LoadOptions, LoadOutcome, PcmAudio, SynthesisArgs, SynthesisBackend};

/// Wire request to the daemon.
#[derive(Debug, Default, Serialize)]
struct DaemonRequest {
    command: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    model_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dtype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    compile: Option<bool>,
    #[serde(skip_serializing_if = "String::is_empty")]
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repetition_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cfg_weight: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ref_audio_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inference_only: Option<bool>,
}

/// Wire response from the daemon.
#[derive(Debug, Deserialize)]
struct DaemonResponse {
    status: Option<String>,
    error: Option<String>,
    audio_base64: Option<String>,
    compiled: Option<bool>,
    device: Option<String>,
    #[allow(dead_code)]
    loaded_models: Option<Vec<String>>,
}

/// Production backend: a sidecar daemon process hosting the ChatterBox
/// runtime, spawned on demand and kept alive across requests.
pub struct DaemonBackend {
    socket_path: PathBuf,
    daemon_script: PathBuf,
    python_cmd: String,
    daemon_process: Mutex<Option<Child>>,
}

impl DaemonBackend {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            socket_path: config.daemon_socket.clone(),
            daemon_script: config.daemon_script.clone(),
            python_cmd: config.python_cmd.clone(),
            daemon_process: Mutex::new(None),
        }
    }

    fn is_running(&self) -> bool {
        self.socket_path.exists() && self.connect().is_ok()
    }

    /// Spawn the daemon if no socket answers, then wait for it to come up.
    ///
    /// Check-and-spawn happens under the `daemon_process` mutex: the model
    /// cache only serializes loads per dialect, so two first loads of
    /// different dialects can get here concurrently and must not race two
    /// daemons onto one socket path.
    fn ensure_running(&self) -> Result<()> {
        let mut guard = self.daemon_process.lock().unwrap();

        if self.is_running() {
            debug!("TTS daemon already running");
            return Ok(());
        }

        info!(script = ?self.daemon_script, "Starting TTS daemon");

        let child = Command::new(&self.python_cmd)
            .arg(&self.daemon_script)
            .arg("--socket")
            .arg(&self.socket_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Synthesis(format!("Failed to start daemon: {}", e)))?;

        *guard = Some(child);

        // Model imports take a while on first start; give it up to 15s.
        for _ in 0..150 {
            std::thread::sleep(Duration::from_millis(100));
            if !self.socket_path.exists() {
                continue;
            }
            if let Ok(mut stream) = self.connect() {
                let probe = DaemonRequest {
                    command: "status".to_string(),
                    ..Default::default()
                };
                if send_request(&mut stream, &probe).is_ok() {
                    info!("TTS daemon up");
                    return Ok(());
                }
            }
        }

        Err(Error::Synthesis(
            "Daemon did not come up within 15 seconds".to_string(),
        ))
    }

    fn connect(&self) -> Result<UnixStream> {
        let stream = UnixStream::connect(&self.socket_path)
            .map_err(|e| Error::Synthesis(format!("Failed to connect to daemon: {}", e)))?;

        stream.set_read_timeout(Some(Duration::from_secs(600))).ok();
        stream.set_write_timeout(Some(Duration::from_secs(30))).ok();
        Ok(stream)
    }

    fn call(&self, request: &DaemonRequest) -> Result<DaemonResponse> {
        self.ensure_running()?;
        let mut stream = self.connect()?;
        send_request(&mut stream, request)
    }

    /// Daemon status: device in use and models held in its cache.
    pub fn status(&self) -> Result<Option<String>> {
        let response = self.call(&DaemonRequest {
            command: "status".to_string(),
            ..Default::default()
        })?;
        Ok(response.device)
    }

    /// Ask the daemon to exit and reap the child process.
    pub fn shutdown(&self) -> Result<()> {
        if self.is_running() {
            info!("Stopping TTS daemon");
            if let Ok(mut stream) = self.connect() {
                let _ = send_request(
                    &mut stream,
                    &DaemonRequest {
                        command: "shutdown".to_string(),
                        ..Default::default()
                    },
                );
            }
        }

        let mut guard = self.daemon_process.lock().unwrap();
        if let Some(mut child) = guard.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
        Ok(())
    }
}

impl SynthesisBackend for DaemonBackend {
    fn load(
        &self,
        dialect: Dialect,
        bundle: &ArtifactBundle,
        opts: &LoadOptions,
    ) -> Result<LoadOutcome> {
        let missing = bundle.missing();
        if !missing.is_empty() {
            return Err(Error::load(
                dialect,
                format!(
                    "Artifact bundle at {:?} is missing {}",
                    bundle.dir,
                    missing.join(", ")
                ),
            ));
        }

        let model_path = bundle.dir.to_string_lossy().to_string();
        let request = DaemonRequest {
            command: "preload".to_string(),
            model_path: model_path.clone(),
            device: Some(opts.device.as_str().to_string()),
            dtype: Some(WEIGHTS_DTYPE.to_string()),
            compile: Some(opts.compile),
            ..Default::default()
        };

        let response = self
            .call(&request)
            .map_err(|e| Error::load(dialect, e.to_string()))?;

        if let Some(err) = response.error {
            return Err(Error::load(dialect, err));
        }

        let compiled = response.compiled.unwrap_or(false);
        if opts.compile && !compiled {
            warn!(dialect = %dialect, "Daemon skipped the compilation pass, running uncompiled");
        }

        Ok(LoadOutcome {
            model: BackendModel {
                dialect,
                token: model_path,
            },
            compiled,
        })
    }

    fn synthesize(&self, model: &BackendModel, args: SynthesisArgs) -> Result<PcmAudio> {
        let request = DaemonRequest {
            command: "generate".to_string(),
            model_path: model.token.clone(),
            text: args.text,
            language: Some(args.language_id),
            temperature: Some(args.temperature),
            repetition_penalty: Some(args.repetition_penalty),
            top_p: Some(args.top_p),
            min_p: Some(args.min_p),
            cfg_weight: Some(args.cfg_weight),
            ref_audio_base64: args
                .reference_wav
                .map(|wav| base64::engine::general_purpose::STANDARD.encode(wav)),
            inference_only: Some(args.inference_only),
            ..Default::default()
        };

        let response = self.call(&request)?;

        if let Some(err) = response.error {
            return Err(Error::Synthesis(err));
        }
        if response.status.as_deref() == Some("error") {
            return Err(Error::Synthesis("Daemon reported failure".to_string()));
        }

        let audio_b64 = response
            .audio_base64
            .ok_or_else(|| Error::Synthesis("No audio in daemon response".to_string()))?;
        let wav_bytes = base64::engine::general_purpose::STANDARD
            .decode(audio_b64.as_bytes())
            .map_err(|e| Error::Synthesis(format!("Failed to decode daemon audio: {}", e)))?;

        let (samples, sample_rate) = audio::decode_wav_bytes(&wav_bytes)
            .map_err(|e| Error::Synthesis(format!("Daemon returned bad WAV: {}", e)))?;

        debug!(samples = samples.len(), sample_rate, "Daemon synthesis done");
        Ok(PcmAudio {
            samples,
            sample_rate,
        })
    }
}

/// Write one length-prefixed (u32 BE) JSON frame and read the reply frame.
fn send_request(stream: &mut UnixStream, request: &DaemonRequest) -> Result<DaemonResponse> {
    let payload = serde_json::to_vec(request)?;

    stream
        .write_all(&(payload.len() as u32).to_be_bytes())
        .and_then(|_| stream.write_all(&payload))
        .and_then(|_| stream.flush())
        .map_err(|e| Error::Synthesis(format!("Failed to write daemon frame: {}", e)))?;

    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .map_err(|e| Error::Synthesis(format!("Failed to read daemon frame length: {}", e)))?;
    let response_len = u32::from_be_bytes(len_buf) as usize;

    let mut body = vec![0u8; response_len];
    stream
        .read_exact(&mut body)
        .map_err(|e| Error::Synthesis(format!("Failed to read daemon frame body: {}", e)))?;

    serde_json::from_slice(&body).map_err(|e| {
        Error::Synthesis(format!(
            "Malformed daemon response: {} - {}",
            e,
            String::from_utf8_lossy(&body)
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;

    /// Frame a canned response the way the daemon would.
    fn frame(json: &str) -> Vec<u8> {
        let mut out = (json.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(json.as_bytes());
        out
    }

    #[test]
    fn frames_round_trip_over_a_socket() {
        let tmp = tempfile::tempdir().unwrap();
        let socket_path = tmp.path().join("daemon.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();

            let mut len_buf = [0u8; 4];
            stream.read_exact(&mut len_buf).unwrap();
            let mut body = vec![0u8; u32::from_be_bytes(len_buf) as usize];
            stream.read_exact(&mut body).unwrap();
            let received: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(received["command"], "status");
            // Omitted optionals never appear on the wire.
            assert!(received.get("text").is_none());

            stream
                .write_all(&frame(r#"{"status":"ok","device":"cpu"}"#))
                .unwrap();
        });

        let mut stream = UnixStream::connect(&socket_path).unwrap();
        let response = send_request(
            &mut stream,
            &DaemonRequest {
                command: "status".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(response.status.as_deref(), Some("ok"));
        assert_eq!(response.device.as_deref(), Some("cpu"));
        server.join().unwrap();
    }

    #[test]
    fn concurrent_ensure_running_spawns_nothing_when_the_socket_answers() {
        let tmp = tempfile::tempdir().unwrap();
        let socket_path = tmp.path().join("daemon.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();

        // One probe connection per caller; each is dropped without a frame.
        let server = std::thread::spawn(move || {
            for _ in 0..2 {
                let (mut stream, _) = listener.accept().unwrap();
                let mut len_buf = [0u8; 4];
                if stream.read_exact(&mut len_buf).is_ok() {
                    let mut body = vec![0u8; u32::from_be_bytes(len_buf) as usize];
                    let _ = stream.read_exact(&mut body);
                    let _ = stream.write_all(&frame(r#"{"status":"ok"}"#));
                }
            }
        });

        let config = crate::config::EngineConfig {
            daemon_socket: socket_path,
            ..Default::default()
        };
        let backend = std::sync::Arc::new(DaemonBackend::from_config(&config));

        let callers: Vec<_> = (0..2)
            .map(|_| {
                let backend = backend.clone();
                std::thread::spawn(move || backend.ensure_running())
            })
            .collect();
        for caller in callers {
            caller.join().unwrap().unwrap();
        }

        // The live socket satisfied both callers under one lock; no child
        // process was ever started.
        assert!(backend.daemon_process.lock().unwrap().is_none());
        server.join().unwrap();
    }

    #[test]
    fn error_frames_surface_as_synthesis_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let socket_path = tmp.path().join("daemon.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut len_buf = [0u8; 4];
            stream.read_exact(&mut len_buf).unwrap();
            let mut body = vec![0u8; u32::from_be_bytes(len_buf) as usize];
            stream.read_exact(&mut body).unwrap();
            stream.write_all(&frame("this is not json")).unwrap();
        });

        let mut stream = UnixStream::connect(&socket_path).unwrap();
        let err = send_request(
            &mut stream,
            &DaemonRequest {
                command: "status".to_string(),
                ..Default::default()
            },
        )
        .unwrap_err();

        assert!(matches!(err, Error::Synthesis(_)));
        server.join().unwrap();
    }
}
