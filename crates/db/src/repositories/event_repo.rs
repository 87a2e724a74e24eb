//! Event log persistence.

use campus_core::types::DbId;
use sqlx::PgExecutor;

use crate::models::event::{EventRecord, NewEvent};

/// Append-only access to the `events` table.
pub struct EventRepo;

impl EventRepo {
    /// Append an event, resolving its type by name.
    ///
    /// Returns `None` when the type name is not registered in `event_types`.
    pub async fn insert<'e>(
        executor: impl PgExecutor<'e>,
        event: &NewEvent<'_>,
    ) -> Result<Option<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO events
                (event_type_id, source_entity_type, source_entity_id, actor_user_id, payload)
             SELECT et.id, $2, $3, $4, $5 FROM event_types et WHERE et.name = $1
             RETURNING id",
        )
        .bind(event.event_type)
        .bind(event.source_entity_type)
        .bind(event.source_entity_id)
        .bind(event.actor_user_id)
        .bind(event.payload)
        .fetch_optional(executor)
        .await
    }

    /// Events recorded for one source entity, oldest first.
    pub async fn list_for_entity<'e>(
        executor: impl PgExecutor<'e>,
        source_entity_type: &str,
        source_entity_id: DbId,
    ) -> Result<Vec<EventRecord>, sqlx::Error> {
        sqlx::query_as::<_, EventRecord>(
            "SELECT e.id, et.name AS event_type, e.source_entity_type, e.source_entity_id,
                    e.actor_user_id, e.payload, e.created_at
             FROM events e
             JOIN event_types et ON et.id = e.event_type_id
             WHERE e.source_entity_type = $1 AND e.source_entity_id = $2
             ORDER BY e.id",
        )
        .bind(source_entity_type)
        .bind(source_entity_id)
        .fetch_all(executor)
        .await
    }
}
