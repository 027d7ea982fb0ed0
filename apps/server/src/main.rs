//! # Shopkeep Server
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Initialize tracing (RUST_LOG or default filter)                    │
//! │  2. Load AppConfig (defaults → shopkeep.toml → SHOPKEEP_* env)         │
//! │  3. Open the database, run migrations                                  │
//! │  4. Spawn the digest scheduler (if enabled)                            │
//! │  5. Serve HTTP until Ctrl+C / SIGTERM, then stop the scheduler         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

use shopkeep_db::Database;
use shopkeep_server::config::AppConfig;
use shopkeep_server::{build_router, digest, init_tracing, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!(version = env!("CARGO_PKG_VERSION"), "Starting Shopkeep server");

    let config = AppConfig::load().context("loading configuration")?;
    let db_path = config.database_path();
    info!(
        addr = %config.bind_addr(),
        db = %db_path.display(),
        media = %config.media.dir.display(),
        "Configuration loaded"
    );

    let db = Database::new(config.db_config())
        .await
        .with_context(|| format!("opening database at {}", db_path.display()))?;
    info!("Database ready");

    tokio::fs::create_dir_all(&config.media.dir)
        .await
        .with_context(|| format!("creating media directory {}", config.media.dir.display()))?;

    let addr = config.bind_addr();
    let state = AppState::new(db.clone(), config).context("building HTTP client")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = if state.config.digest.enabled {
        if !state.mailer.is_configured() {
            warn!("Digest enabled but email is not configured; sends will fail");
        }
        Some(tokio::spawn(digest::run_scheduler(state.clone(), shutdown_rx)))
    } else {
        None
    };

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            error!("Digest scheduler task failed: {}", e);
        }
    }
    db.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received, starting graceful shutdown...");
}
