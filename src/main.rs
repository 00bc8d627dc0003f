use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};

mod api;
mod config;
mod error;
mod keys;
mod normalize;
mod prompt;
mod proxy;
mod sanitize;
mod upstream;

pub use config::Config;
pub use error::ChatError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Container HEALTHCHECK: hit /healthz and exit without starting a server.
    if std::env::args().nth(1).as_deref() == Some("--healthcheck") {
        return healthcheck().await;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portfolio_chat_proxy=info,tower_http=warn".into()),
        )
        .init();

    let config = load_config()?;

    let state = Arc::new(proxy::ProxyState::new(
        Arc::new(config),
        keys::KeySource::Process,
    )?);

    let key_count = state.keys.pool().len();
    if key_count == 0 {
        warn!("no API_KEY_* variables set; chat requests will fail until one is added");
    }
    info!(
        model = %state.config.upstream.model,
        allowed_origin = %state.config.server.allowed_origin,
        keys = key_count,
        "chat proxy starting"
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", state.config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, route = api::chat::CHAT_ROUTE, "listening");

    let app = api::chat::router(Arc::clone(&state))
        .layer(axum::middleware::from_fn(api::request_id::request_id_middleware))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO))
                .on_response(tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO)),
        );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("chat proxy server error")?;

    info!("shutdown complete");
    Ok(())
}

fn load_config() -> anyhow::Result<Config> {
    let config_path = std::env::var("CHAT_PROXY_CONFIG").ok().map(PathBuf::from);
    Config::load(config_path.as_deref()).with_context(|| match &config_path {
        Some(path) => format!("Failed to load config from {}", path.display()),
        None => "Failed to load config from environment".to_owned(),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
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
                warn!(error = %e, "failed to install SIGTERM handler");
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
    info!("shutdown signal received");
}

/// `chat-proxy --healthcheck`: GET /healthz on the configured port and exit
/// 0 on 2xx, 1 otherwise. A config the server would refuse counts as unhealthy.
async fn healthcheck() -> anyhow::Result<()> {
    let healthy = match load_config() {
        Ok(config) => match reqwest::get(healthz_url(&config)).await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        },
        Err(e) => {
            eprintln!("healthcheck: {e:#}");
            false
        }
    };

    std::process::exit(if healthy { 0 } else { 1 });
}

fn healthz_url(config: &Config) -> String {
    format!("http://127.0.0.1:{}/healthz", config.server.port)
}
