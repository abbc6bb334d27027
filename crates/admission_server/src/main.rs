pub mod config;
pub mod http;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

use std::net::SocketAddr;

use admission_core::RateLimiter;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{config::ServerConfig, routes::router};
pub use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let limiter = RateLimiter::with_config(config.limiter_config())?;
    info!(
        rate = config.rate,
        capacity = config.capacity,
        idle_timeout_secs = config.idle_timeout.as_secs(),
        sweep_interval_secs = config.sweep_interval.as_secs(),
        shards = config.shards,
        "Rate limiter ready"
    );

    let addr = config.bind_addr;
    let state = AppState::new(config, limiter.clone());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Starting admission server on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    limiter.shutdown();
    info!(tracked_keys = limiter.len(), "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
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
    info!("Shutdown signal received");
}
