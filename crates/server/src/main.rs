mod api;
mod metrics;
mod state;

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quarryscout_core::{load_config, validate_config, Engine};

use state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,quarryscout_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config().context("failed to load configuration from environment")?;
    validate_config(&config).context("configuration validation failed")?;
    info!(port = config.server.port, database_url = %config.database_url, "configuration loaded");

    let engine = Engine::start(&config)
        .await
        .context("failed to start engine")?;

    let state = AppState::new(config.clone(), engine.clone());
    let app = api::create_router(state);

    let addr = std::net::SocketAddr::new(config.server.host, config.server.port);
    info!(%addr, "starting server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server shutting down, draining for up to 10s");
    tokio::time::timeout(Duration::from_secs(10), engine.shutdown())
        .await
        .unwrap_or_else(|_| info!("shutdown drain window elapsed before engine finished"));

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
