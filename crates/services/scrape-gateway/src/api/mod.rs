//! HTTP API for the scrape gateway
//!
//! - `GET /scrape` - full discovery for a movie or show (SSE)
//! - `GET /scrape/embed` - run one embed scraper (SSE)
//! - `GET /scrape/source` - run one source scraper (SSE)
//! - `GET /metadata` - registered sources and embeds
//! - `GET /health` - liveness

pub mod scrape;

use axum::{extract::State, http::HeaderValue, routing::get, Json, Router};
use mediascrape_engine::{ProviderMeta, ScrapeEngine};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::AuthBroker;
use crate::config::{Config, CorsConfig};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Scraping engine, shared by every connection
    pub engine: Arc<dyn ScrapeEngine>,
    /// Credential broker; `None` when authentication is disabled
    pub auth: Option<Arc<AuthBroker>>,
    /// Service configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(
        engine: Arc<dyn ScrapeEngine>,
        auth: Option<Arc<AuthBroker>>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            engine,
            auth,
            config,
        }
    }
}

/// Build the HTTP API router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors);

    Router::new()
        // Scrape endpoints
        .route("/scrape", get(scrape::scrape))
        .route("/scrape/embed", get(scrape::scrape_embed))
        .route("/scrape/source", get(scrape::scrape_source))
        // Engine metadata and health
        .route("/metadata", get(metadata))
        .route("/health", get(health_check))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Providers known to the engine
#[derive(Debug, Serialize)]
pub struct MetadataResponse {
    pub embeds: Vec<ProviderMeta>,
    pub sources: Vec<ProviderMeta>,
}

/// Metadata endpoint
async fn metadata(State(state): State<AppState>) -> Json<MetadataResponse> {
    Json(MetadataResponse {
        embeds: state.engine.list_embeds(),
        sources: state.engine.list_sources(),
    })
}
