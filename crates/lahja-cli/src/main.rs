//! Lahja CLI - model fetcher and command-line client for the TTS server.
//!
//! Examples:
//!   lahja pull egyptian            # Download one dialect's checkpoint
//!   lahja pull all                 # Download every dialect
//!   lahja verify ksa               # Check a local bundle
//!   lahja dialects                 # List supported dialects
//!   lahja tts "مرحبا" -d egyptian -o out.wav
//!   lahja health                   # Probe a running server

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use lahja_core::{
    parse_dialect, ArtifactFetcher, ArtifactStore, Dialect, EngineConfig, GenerationParams,
};

#[derive(Parser)]
#[command(
    name = "lahja",
    about = "Arabic-dialect text-to-speech",
    version = env!("CARGO_PKG_VERSION"),
    arg_required_else_help = true,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Server URL for API commands
    #[arg(
        long,
        global = true,
        value_name = "URL",
        default_value = "http://localhost:8080"
    )]
    server: String,

    /// Models directory (defaults to the engine's data dir)
    #[arg(long, global = true, value_name = "PATH")]
    models_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a dialect's model artifacts from the Hub
    Pull {
        /// Dialect id, or "all"
        dialect: String,
    },

    /// Verify a local artifact bundle (presence + checkpoint fingerprint)
    Verify {
        /// Dialect id, or "all"
        dialect: String,
    },

    /// List the supported dialects
    Dialects,

    /// Synthesize speech through a running server
    Tts {
        /// Text to synthesize
        text: String,

        /// Dialect id
        #[arg(short, long)]
        dialect: String,

        /// Output WAV path
        #[arg(short, long, default_value = "out.wav")]
        out: PathBuf,

        /// Reference WAV for voice conditioning
        #[arg(short, long)]
        reference: Option<PathBuf>,

        #[arg(long)]
        temperature: Option<f32>,
        #[arg(long)]
        repetition_penalty: Option<f32>,
        #[arg(long)]
        top_p: Option<f32>,
        #[arg(long)]
        min_p: Option<f32>,
        #[arg(long)]
        cfg_weight: Option<f32>,
    },

    /// Show server health (loaded models, device)
    Health,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lahja_core=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let models_dir = cli
        .models_dir
        .clone()
        .unwrap_or_else(|| EngineConfig::default().models_dir);
    let store = ArtifactStore::new(models_dir);

    match cli.command {
        Commands::Pull { dialect } => pull(&store, &dialect),
        Commands::Verify { dialect } => verify(&store, &dialect),
        Commands::Dialects => {
            for dialect in Dialect::all() {
                println!("{:<10} {}", dialect.id(), dialect.display_name());
            }
            Ok(())
        }
        Commands::Tts {
            text,
            dialect,
            out,
            reference,
            temperature,
            repetition_penalty,
            top_p,
            min_p,
            cfg_weight,
        } => {
            let params_defaults = GenerationParams::default();
            tts(
                &cli.server,
                &text,
                &dialect,
                &out,
                reference.as_deref(),
                GenerationParams {
                    temperature: temperature.unwrap_or(params_defaults.temperature),
                    repetition_penalty: repetition_penalty
                        .unwrap_or(params_defaults.repetition_penalty),
                    top_p: top_p.unwrap_or(params_defaults.top_p),
                    min_p: min_p.unwrap_or(params_defaults.min_p),
                    cfg_weight: cfg_weight.unwrap_or(params_defaults.cfg_weight),
                },
            )
        }
        Commands::Health => health(&cli.server),
    }
}

fn resolve_dialects(arg: &str) -> Result<Vec<Dialect>> {
    if arg.trim().eq_ignore_ascii_case("all") {
        return Ok(Dialect::all().to_vec());
    }
    Ok(vec![parse_dialect(arg).map_err(|e| anyhow::anyhow!(e))?])
}

fn pull(store: &ArtifactStore, arg: &str) -> Result<()> {
    let fetcher = ArtifactFetcher::new(store.clone())?;
    for dialect in resolve_dialects(arg)? {
        println!("Pulling {} from {}...", dialect.id(), dialect.repo_id());
        let dir = fetcher.pull(dialect)?;
        println!("  done: {}", dir.display());
    }
    Ok(())
}

fn verify(store: &ArtifactStore, arg: &str) -> Result<()> {
    let mut failures = 0;
    for dialect in resolve_dialects(arg)? {
        match store.verify(dialect) {
            Ok(report) => println!(
                "{:<10} ok ({} tensors, {}-row text vocabulary)",
                dialect.id(),
                report.tensor_count,
                report.text_vocab_rows
            ),
            Err(e) => {
                println!("{:<10} FAILED: {}", dialect.id(), e);
                failures += 1;
            }
        }
    }
    if failures > 0 {
        bail!("{} bundle(s) failed verification", failures);
    }
    Ok(())
}

fn tts(
    server: &str,
    text: &str,
    dialect: &str,
    out: &std::path::Path,
    reference: Option<&std::path::Path>,
    params: GenerationParams,
) -> Result<()> {
    let client = reqwest::blocking::Client::new();

    let reference_key = match reference {
        Some(path) => {
            let form = reqwest::blocking::multipart::Form::new()
                .file("file", path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let response: serde_json::Value = client
                .post(format!("{}/api/upload-reference", server))
                .multipart(form)
                .send()
                .context("Upload request failed")?
                .error_for_status()
                .context("Upload rejected")?
                .json()?;
            let key = response["reference_key"]
                .as_str()
                .context("No reference_key in upload response")?
                .to_string();
            println!("Uploaded reference clip: {}", key);
            Some(key)
        }
        None => None,
    };

    let body = serde_json::json!({
        "text": text,
        "dialect": dialect,
        "temperature": params.temperature,
        "repetition_penalty": params.repetition_penalty,
        "top_p": params.top_p,
        "min_p": params.min_p,
        "cfg_weight": params.cfg_weight,
        "reference_key": reference_key,
    });

    let response = client
        .post(format!("{}/api/tts", server))
        .json(&body)
        .timeout(std::time::Duration::from_secs(600))
        .send()
        .context("TTS request failed")?;

    if !response.status().is_success() {
        let status = response.status();
        let detail = response.text().unwrap_or_default();
        bail!("Server returned {}: {}", status, detail);
    }

    let elapsed = response
        .headers()
        .get("X-Inference-Time")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let wav = response.bytes()?;
    std::fs::write(out, &wav).with_context(|| format!("Failed to write {}", out.display()))?;

    println!("Wrote {} bytes to {}", wav.len(), out.display());
    if let Some(secs) = elapsed {
        println!("Synthesis time: {}s", secs);
    }
    Ok(())
}

fn health(server: &str) -> Result<()> {
    let response: serde_json::Value = reqwest::blocking::get(format!("{}/health", server))
        .context("Health request failed")?
        .json()?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
