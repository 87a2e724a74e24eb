use std::sync::Arc;

use campus_events::EventBus;
use campus_payments::ProviderRegistry;
use tokio_util::task::TaskTracker;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: campus_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Domain event bus; the engine publishes after each commit.
    pub event_bus: Arc<EventBus>,
    /// Payment provider adapters, looked up by kind.
    pub providers: Arc<ProviderRegistry>,
    /// Tracks spawned webhook processing so shutdown can drain it.
    pub background: TaskTracker,
}
