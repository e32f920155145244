//! Odoo Bridge - HTTP front for an Odoo XML-RPC backend
//!
//! Loads the configuration from the environment, connects and
//! authenticates once, then serves the read API until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use odoo_bridge::{
    create_router, AccessController, AppState, Config, OdooConnection, PerformanceManager,
};

/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from `.env` and environment variables
/// 3. Build the shared performance manager
/// 4. Connect and authenticate
/// 5. Enable per-model access control when an API key is configured
/// 6. Serve the router on the configured port
/// 7. Disconnect after graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "odoo_bridge=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Odoo Bridge");

    let config = Arc::new(Config::load(None).context("invalid configuration")?);
    info!(
        url = %config.url,
        database = ?config.database,
        api_key = config.uses_api_key(),
        timeout_secs = config.timeout_secs,
        port = config.server_port,
        "Configuration loaded"
    );

    let manager = Arc::new(PerformanceManager::from_config(&config)?);
    let connection = Arc::new(OdooConnection::new(config.clone(), manager.clone())?);
    let access = if config.uses_api_key() {
        info!("Model access control enabled");
        Some(Arc::new(AccessController::new(&config, manager)?))
    } else {
        warn!("No API key configured, model access control disabled");
        None
    };

    connection.connect().await.context("failed to connect to Odoo")?;
    if let Err(e) = connection.authenticate(None).await {
        connection.disconnect();
        return Err(e).context("failed to authenticate with Odoo");
    }

    let mut state = AppState::new(connection.clone());
    if let Some(access) = access {
        state = state.with_access(access);
    }

    let served = serve(state, config.server_port).await;
    connection.disconnect();
    if let Err(e) = &served {
        error!(error = %e, "server stopped with an error");
    }
    served?;

    info!("Server shutdown complete");
    Ok(())
}

async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
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
                error!(error = %e, "failed to install SIGTERM handler");
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
}
