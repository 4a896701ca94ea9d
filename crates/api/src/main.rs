use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatehouse_api::config::ServerConfig;
use gatehouse_api::state::AppState;
use gatehouse_api::{background, gateway, router};
use gatehouse_events::{EventBus, MonitoringTrail, PresentationRefresher};
use gatehouse_review::ReviewServices;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "gatehouse_api=debug,gatehouse_review=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let pool = gatehouse_db::create_pool(&config.database_url, config.db_max_connections).await?;
    tracing::info!(max_connections = config.db_max_connections, "Database connection pool created");

    gatehouse_db::health_check(&pool).await?;
    tracing::info!("Database health check passed");

    gatehouse_db::run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    // --- Gateway and services ---
    let (collaborators, presenter) = gateway::connect(config.gateway.as_ref());
    let services = ReviewServices::new(
        pool.clone(),
        collaborators,
        Arc::clone(&event_bus),
        config.bridge.clone(),
    );

    let open = services.bridge.rebuild_open_set().await?;
    tracing::info!(open_bridges = open, "Open-channel set rebuilt");

    // --- Event subscribers ---
    let trail = MonitoringTrail::default();
    let refresher_handle = tokio::spawn(PresentationRefresher::run(presenter, event_bus.subscribe()));
    let trail_handle = tokio::spawn(trail.clone().run(event_bus.subscribe()));

    // --- Background sweepers ---
    let cancel = CancellationToken::new();
    let forwarded_handle = tokio::spawn(background::forwarded_sweep::run(
        Arc::clone(&services.forwarded),
        cancel.clone(),
    ));
    let guard_handle = tokio::spawn(background::guard_sweep::run(
        Arc::clone(&services.bridge),
        cancel.clone(),
    ));
    tracing::info!("Background services started (refresher, monitoring trail, sweepers)");

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        services,
        event_bus: Arc::clone(&event_bus),
        trail,
    };

    let app = router::build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(config.host.parse()?, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    cancel.cancel();
    let _ = tokio::time::timeout(grace, forwarded_handle).await;
    let _ = tokio::time::timeout(grace, guard_handle).await;
    tracing::info!("Sweepers stopped");

    // Dropping the last sender closes the bus; the subscribers then exit.
    drop(event_bus);
    let _ = tokio::time::timeout(grace, refresher_handle).await;
    let _ = tokio::time::timeout(grace, trail_handle).await;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
