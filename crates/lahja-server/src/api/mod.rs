//! HTTP API surface.

mod meta;
mod reference;
mod tts;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the main API router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/tts", post(tts::generate))
        .route("/compare", post(tts::compare))
        .route("/upload-reference", post(reference::upload))
        .route("/reference/:key", get(reference::download))
        .route("/dialects", get(meta::dialects))
        .route("/samples", get(meta::samples))
        .route("/samples/:dialect/:sample_id", get(meta::sample_audio))
        .route("/health", get(meta::health));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(meta::health))
        // Serve the browser UI as static files.
        .fallback_service(
            tower_http::services::ServeDir::new("ui")
                .fallback(tower_http::services::ServeFile::new("ui/index.html")),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
