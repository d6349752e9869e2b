//! Home-nursing service marketplace.
//!
//! Patients request nursing visits, nurses accept and complete them and
//! admins activate accounts and watch the numbers. The crate ships two
//! binaries:
//!
//! - `homecare`: the JSON API server (axum over an embedded SQLite store).
//! - `homecare-console`: a terminal client for logging in, registering and
//!   checking the account status against a running server.
//!
//! # Server configuration
//!
//! | Variable | Default |
//! |---|---|
//! | `PORT` | `3000` |
//! | `DATABASE_PATH` | `homecare.db` |
//! | `JWT_SECRET` | required (env or `/run/secrets/JWT_SECRET`) |
//! | `SESSION_TTL_SECS` | `604800` |
//! | `BCRYPT_COST` | `12` |
//! | `ALLOW_ADMIN_SIGNUP` | `false` |
//! | `ADMIN_EMAIL`, `ADMIN_PASSWORD`, `ADMIN_NAME`, `ADMIN_PHONE` | unset |
//! | `EMAIL_FROM` | `no-reply@homecare.local` |
//!
//! Logging is controlled with `RUST_LOG`, e.g. `RUST_LOG=homecare=debug,tower_http=info`.

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal::ctrl_c};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

pub mod app;
pub mod auth;
pub mod client;
pub mod components;
pub mod config;
pub mod db;
pub mod error;
pub mod gate;
pub mod lifecycle;
pub mod models;
pub mod notify;
pub mod questions;
pub mod reporting;
pub mod routes;
pub mod session;
pub mod state;
pub mod tui;

use config::Config;
use state::AppState;

pub async fn start_server() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading configuration...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = AppState::new(config)?;
    let app = routes::app(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
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
