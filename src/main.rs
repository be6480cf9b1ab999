//! BrewNotes binary entry point

use brewnotes::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Initialize tracing/logging
/// 2. Load configuration from file and environment
/// 3. Initialize AppState
/// 4. Build Axum router
/// 5. Start background tasks (session cleanup)
/// 6. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize tracing/logging
    let log_format =
        std::env::var("BREWNOTES__LOGGING__FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "brewnotes=info,tower_http=debug".into());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting BrewNotes...");

    // 2. Initialize metrics
    brewnotes::metrics::init_metrics();

    // 3. Load configuration
    let config = config::AppConfig::load()?;
    tracing::info!(
        domain = %config.server.domain,
        protocol = %config.server.protocol,
        "Configuration loaded"
    );

    // 4. Initialize application state
    let state = AppState::new(config.clone()).await?;

    // 5. Build Axum router
    let app = brewnotes::build_router(state.clone());

    // 6. Start background tasks
    spawn_session_cleanup_task(state.clone());

    // 7. Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Public URL: {}", config.server.base_url());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.db.close().await;
    tracing::info!("Shut down cleanly");

    Ok(())
}

/// Spawn background task removing expired sessions
fn spawn_session_cleanup_task(state: AppState) {
    let configured_interval_secs = state.config.auth.session_cleanup_interval_seconds;
    if configured_interval_secs == 0 {
        tracing::info!("auth.session_cleanup_interval_seconds=0; session cleanup disabled");
        return;
    }

    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(configured_interval_secs));

        loop {
            interval.tick().await;

            match state.sessions.purge_expired().await {
                Ok(0) => tracing::debug!("No expired sessions"),
                Ok(removed) => tracing::info!(removed, "Expired sessions removed"),
                Err(error) => tracing::error!(%error, "Session cleanup failed"),
            }
        }
    });

    tracing::info!("Session cleanup task spawned");
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(error) => tracing::error!(%error, "Failed to listen for shutdown signal"),
    }
}
