//! Writes every published [`PlatformEvent`] to the `events` table.

use campus_core::types::DbId;
use campus_db::models::event::NewEvent;
use campus_db::repositories::EventRepo;
use campus_db::DbPool;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::bus::PlatformEvent;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Event type '{0}' is not registered")]
    UnknownEventType(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Background subscriber that keeps the durable event log.
pub struct EventPersistence;

impl EventPersistence {
    /// Persist events from `receiver` until every bus sender is dropped.
    ///
    /// A failed write is logged and skipped. Publishers never wait on this
    /// loop, so a slow database shows up as `Lagged` here instead.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<PlatformEvent>) {
        let mut persisted: u64 = 0;
        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event log fell behind, events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            match Self::persist(&pool, &event).await {
                Ok(_) => persisted += 1,
                Err(e) => tracing::error!(
                    error = %e,
                    event_type = %event.event_type,
                    source_entity_id = ?event.source_entity_id,
                    "Failed to persist event",
                ),
            }
        }
        tracing::info!(persisted, "Event bus closed, event log stopped");
    }

    /// Write one event, returning the new row id.
    pub async fn persist(pool: &DbPool, event: &PlatformEvent) -> Result<DbId, PersistError> {
        let row = NewEvent {
            event_type: &event.event_type,
            source_entity_type: event.source_entity_type.as_deref(),
            source_entity_id: event.source_entity_id,
            actor_user_id: event.actor_user_id,
            payload: &event.payload,
        };
        EventRepo::insert(pool, &row)
            .await?
            .ok_or_else(|| PersistError::UnknownEventType(event.event_type.clone()))
    }
}
