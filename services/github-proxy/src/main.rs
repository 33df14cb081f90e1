//! Git Port GitHub proxy
//!
//! Single-binary Rust service that:
//! 1. Loads a pool of GitHub API tokens from config/env
//! 2. Proxies five GitHub REST read endpoints for the browser front-end
//! 3. Rotates tokens on 403 (quota exhaustion) with a single retry
//! 4. Tracks per-route counters, exposed at /metrics and /metrics/clean

mod config;
mod error;
mod metrics;
mod rotation;
mod routes;
mod stats;
mod upstream;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use metrics_exporter_prometheus::PrometheusHandle;
use token_pool::TokenPool;

use crate::config::Config;
use crate::rotation::RotatingFetcher;
use crate::stats::Stats;
use crate::upstream::UpstreamClient;

/// How long to wait for in-flight requests after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<RotatingFetcher>,
    pub stats: Stats,
    pub prometheus: PrometheusHandle,
    pub base_url: Url,
    pub environment: String,
}

/// Build the axum router with all routes and shared state.
///
/// The stats middleware wraps everything but only tracks paths matching the
/// five proxied route prefixes; CORS is permissive because the front-end is
/// served from a different origin.
fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/user/{username}", get(routes::user_details))
        .route("/repos/{username}", get(routes::user_repos))
        .route("/events/{username}", get(routes::user_events))
        .route("/followers/{username}", get(routes::user_followers))
        .route("/following/{username}", get(routes::user_following));

    Router::new()
        .route("/", get(welcome_handler))
        .route("/metrics", get(metrics_handler))
        .route("/metrics/clean", get(clean_metrics_handler))
        .nest("/api/github", api)
        .layer(axum::middleware::from_fn_with_state(
            state.stats.clone(),
            stats::track,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting gitport-proxy");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let base_url = Url::parse(&config.upstream.base_url)
        .with_context(|| format!("invalid upstream base_url: {}", config.upstream.base_url))?;

    info!(
        listen_addr = %config.server.listen_addr,
        base_url = %base_url,
        environment = %config.server.environment,
        tokens = config.github.tokens.len(),
        timeout_secs = config.upstream.timeout_secs,
        "configuration loaded"
    );

    if config.github.tokens.is_empty() {
        warn!(
            "no GitHub tokens configured — every proxied call will fail until \
             GITHUB_TOKENS or tokens_file provides one"
        );
    }

    let pool = Arc::new(TokenPool::new(config.github.tokens));
    let client = UpstreamClient::new(
        reqwest::Client::new(),
        Duration::from_secs(config.upstream.timeout_secs),
    );

    let state = AppState {
        fetcher: Arc::new(RotatingFetcher::new(pool, client)),
        stats: Stats::new(),
        prometheus: prometheus_handle,
        base_url,
        environment: config.server.environment,
    };

    let app = build_router(state);

    let listener = TcpListener::bind(config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.server.listen_addr))?;

    info!(addr = %config.server.listen_addr, "accepting requests");

    // Graceful shutdown with drain timeout enforcement:
    // 1. shutdown_signal() fires on SIGTERM/SIGINT
    // 2. axum stops accepting new connections and drains in-flight requests
    // 3. DRAIN_TIMEOUT bounds the drain so a slow client cannot block exit
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Static welcome text, matching the contract the front-end pings.
async fn welcome_handler() -> &'static str {
    "Welcome to Git Port."
}

/// Prometheus metrics endpoint — returns metrics in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// JSON metrics summary: request counters plus server identity, computed
/// read-only from the stats registry on every call.
async fn clean_metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut body = state.stats.snapshot();
    if let Some(obj) = body.as_object_mut() {
        obj.insert(
            "server".into(),
            serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "env": state.environment,
                "uptimeSeconds": state.stats.uptime_seconds(),
            }),
        );
        obj.insert(
            "lastUpdated".into(),
            serde_json::json!(
                chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
            ),
        );
    }
    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
