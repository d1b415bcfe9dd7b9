//! kvfront - A cache-aside key-value service
//!
//! Binary entry point: loads configuration, opens the store connection pool
//! and serves the HTTP API until SIGINT/SIGTERM.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kvfront::api::create_router;
use kvfront::config::StoreBackend;
use kvfront::store::MemorySource;
use kvfront::{spawn_pool_monitor, AppState, Config};

/// Main entry point for the kvfront server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Open the store connection pool (refuse to start if no connection opens)
/// 4. Start the background pool monitor
/// 5. Serve the HTTP API on the configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kvfront=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting kvfront key-value service");

    let config = Config::from_env().context("invalid configuration")?;
    config.validate().context("invalid configuration")?;
    info!(
        "Configuration loaded: cache_capacity={}, pool_size={}, backend={}, port={}, on_reset_failure={}",
        config.cache_capacity,
        config.pool_size,
        config.store_backend,
        config.server_port,
        config.on_reset_failure
    );

    let state = connect_state(&config).await?;
    info!("Store connection pool initialized");

    let monitor_handle = spawn_pool_monitor(state.coordinator.clone(), config.monitor_interval);

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(monitor_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Builds the application state for the configured backend.
async fn connect_state(config: &Config) -> anyhow::Result<AppState> {
    let state = match config.store_backend {
        StoreBackend::Memory => AppState::connect(MemorySource::new(), config).await,
        #[cfg(feature = "postgres")]
        StoreBackend::Postgres => {
            let source = kvfront::store::PostgresSource::new(config.database_url.clone());
            AppState::connect(source, config).await
        }
        #[cfg(not(feature = "postgres"))]
        StoreBackend::Postgres => anyhow::bail!("built without the `postgres` feature"),
    };
    state.context("failed to open store connection pool")
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the pool monitor and allows graceful shutdown.
async fn shutdown_signal(monitor_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    monitor_handle.abort();
    warn!("Pool monitor aborted");
}
