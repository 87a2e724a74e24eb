use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::task::TaskTracker;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campus_api::router::build_app_router;
use campus_api::config::ServerConfig;
use campus_api::state::AppState;
use campus_events::{EventBus, EventPersistence};
use campus_payments::ProviderRegistry;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_api=debug,campus_events=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = campus_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    campus_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    campus_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready, migrations applied");

    // --- Event log ---
    let event_bus = Arc::new(EventBus::new(config.event_bus_capacity));
    let event_log = tokio::spawn(EventPersistence::run(pool.clone(), event_bus.subscribe()));

    // --- Payment providers ---
    // Network adapters are registered here by the deployment.
    let providers = ProviderRegistry::new();
    if providers.configured().is_empty() {
        tracing::warn!("No payment providers registered; paid checkout paths will fail");
    }

    let background = TaskTracker::new();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        event_bus: Arc::clone(&event_bus),
        providers: Arc::new(providers),
        background: background.clone(),
    };
    let app = build_app_router(state);

    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // Webhook tasks may still be enrolling; give them the configured grace.
    background.close();
    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(grace, background.wait()).await.is_err() {
        tracing::warn!(
            pending = background.len(),
            "Webhook tasks still running at shutdown timeout"
        );
    }

    // Dropping the last sender closes the channel and ends the event log.
    drop(event_bus);
    if tokio::time::timeout(Duration::from_secs(5), event_log).await.is_err() {
        tracing::warn!("Event log did not drain before exit");
    }
    tracing::info!("Shutdown complete");
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
