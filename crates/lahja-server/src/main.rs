//! Lahja TTS Server - HTTP facade over the dialect TTS engine.

use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod error;
mod state;

use lahja_core::{parse_dialect, Dialect, EngineConfig, TtsEngine};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lahja_server=info,lahja_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Lahja TTS Server");

    let config = EngineConfig::default();
    info!("Models directory: {:?}", config.models_dir);

    let engine = TtsEngine::new(config)?;
    let state = AppState::new(engine);

    preload_requested_dialects(&state).await;

    let app = api::create_router(state.clone());

    let host = std::env::var("LAHJA_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = match std::env::var("LAHJA_PORT") {
        Ok(raw) => match raw.parse::<u16>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("Invalid LAHJA_PORT='{}', falling back to 8080", raw);
                8080
            }
        },
        Err(_) => 8080,
    };
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    info!("Server ready. Press Ctrl+C to stop.");
    server.await?;

    Ok(())
}

/// Warm models named in LAHJA_PRELOAD ("all" or comma-separated dialect
/// ids). A preload failure is logged, not fatal; the model stays lazy.
async fn preload_requested_dialects(state: &AppState) {
    let Ok(raw) = std::env::var("LAHJA_PRELOAD") else {
        return;
    };

    let dialects: Vec<Dialect> = if raw.trim().eq_ignore_ascii_case("all") {
        Dialect::all().to_vec()
    } else {
        raw.split(',')
            .filter_map(|id| match parse_dialect(id) {
                Ok(dialect) => Some(dialect),
                Err(e) => {
                    warn!("Skipping preload entry: {}", e);
                    None
                }
            })
            .collect()
    };

    for dialect in dialects {
        info!(dialect = %dialect, "Preloading model");
        if let Err(e) = state.engine.preload(dialect).await {
            warn!(dialect = %dialect, "Preload failed, will load lazily: {}", e);
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        },
    }
}
