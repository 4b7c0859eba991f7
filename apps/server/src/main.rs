//! # Caja Server
//!
//! Point-of-sale HTTP server.
//!
//! ## Usage
//! ```bash
//! caja-server                      # defaults + CAJA_* variables
//! caja-server --config caja.toml
//! RUST_LOG=debug caja-server
//! ```

use std::env;
use std::path::PathBuf;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use caja_db::{Database, DbConfig};
use caja_server::{router, AppState, ServerConfig};

const DEFAULT_LOG_FILTER: &str = "info,caja=debug,sqlx=warn";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_target(true)
        .init();

    info!("Starting Caja POS server...");

    // Load configuration
    let config = ServerConfig::load(config_path_arg())?;
    let report_offset = config.report_offset()?;
    info!(
        addr = %config.listen_address(),
        db_path = %config.database_path.display(),
        tax_kind = %config.default_tax_kind,
        report_utc_offset = %report_offset,
        "Configuration loaded"
    );

    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Connect to database (migrations run on connect)
    let db = Database::new(
        DbConfig::new(&config.database_path).max_connections(config.db_max_connections),
    )
    .await?;
    info!("Database ready");

    let state = AppState::new(db.clone(), config.default_tax_kind.clone(), report_offset);

    // The configured tax kind must exist before the first sale
    let rate = db.tax_rates().current(state.processor.tax_kind()).await?;
    info!(kind = %rate.kind, rate = %rate.rate().fraction(), "Tax rate loaded");

    let app = router(state);

    let listener = TcpListener::bind(config.listen_address()).await?;
    info!(addr = %config.listen_address(), "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// `--config <path>` from the command line, if given.
fn config_path_arg() -> Option<PathBuf> {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" || arg == "-c" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
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
