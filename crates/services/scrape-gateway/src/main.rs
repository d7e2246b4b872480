//! Media Scrape Gateway Binary
//!
//! Entry point for the scrape gateway service.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediascrape_engine::ProviderEngine;
use mediascrape_gateway::{
    api::{build_router, AppState},
    auth::{jwt::SessionTokenCodec, turnstile::TurnstileVerifier, AuthBroker},
    config::Config,
    fetch_router::FetchRouter,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Media Scrape Gateway...");

    // Load configuration
    let config_path = std::env::var("GATEWAY_CONFIG").ok();
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;
    let config = Arc::new(config);

    tracing::info!(
        "Configuration: HTTP port={}, auth={}, proxy={}",
        config.server.http_port,
        config.auth.enabled,
        config.proxy.url.is_some()
    );

    // Outbound network layer for scrapers
    let timeout = Duration::from_secs(config.server.fetch_timeout_seconds);
    let fetcher = FetchRouter::from_config(&config.proxy, timeout)
        .context("Failed to create outbound fetcher")?;
    let engine = Arc::new(ProviderEngine::new(Arc::new(fetcher)));

    // Credential gate
    let auth = if config.auth.enabled {
        if config.auth.turnstile_secret.is_empty() {
            tracing::warn!("Authentication enabled without a Turnstile secret");
        }
        let verifier = TurnstileVerifier::new(
            config.auth.turnstile_secret.clone(),
            config.auth.turnstile_verify_url.clone(),
        )
        .context("Failed to create Turnstile verifier")?;
        let ttl = i64::try_from(config.auth.token_ttl_seconds)
            .context("Session token lifetime out of range")?;
        let codec = SessionTokenCodec::new(&config.auth.jwt_secret, ttl);
        Some(Arc::new(AuthBroker::new(Arc::new(verifier), codec)))
    } else {
        tracing::warn!("Authentication disabled, every request is accepted");
        None
    };

    // Create app state
    let state = AppState::new(engine, auth, config.clone());

    // Build HTTP router
    let router = build_router(state);

    // Start HTTP server
    let bind_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("HTTP server listening on {}", bind_addr);

    // Run the HTTP server with graceful shutdown on SIGTERM/SIGINT
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, initiating graceful shutdown...");
    })
    .await?;

    tracing::info!("Media Scrape Gateway shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
