mod api;
mod app;
mod auth;
mod config;
mod db;
mod domain;
mod error;
mod logging;
mod middleware;
mod routes;
mod services;

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::signal;

use services::RedisCache;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = config::Settings::from_env()?;
    logging::init_logging(&settings);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        version = env!("CARGO_PKG_VERSION"),
        "Starting SmartShop backend"
    );

    let pool = db::create_pool(&settings).await?;
    db::run_migrations(&pool).await?;
    services::accounts::bootstrap_admin(&pool, &settings).await?;

    let cache = RedisCache::new(&settings.redis_url, settings.redis_cache_ttl_seconds).await?;
    let state = app::AppState::new(pool, settings.clone(), cache)?;

    match settings.verification_interval_hours {
        0 => tracing::info!("Partner verification job disabled"),
        hours => {
            let interval = Duration::from_secs(hours * 3600);
            tokio::spawn(state.verification.clone().run_every(interval));
            tracing::info!(every_hours = hours, "Partner verification job scheduled");
        }
    }

    let app = app::create_app(state);

    let listener = tokio::net::TcpListener::bind(&settings.server_addr)
        .await
        .with_context(|| format!("Failed to bind {}", settings.server_addr))?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM so in-flight checkouts can finish.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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
    tracing::info!("Shutdown signal received");
}
