//! Persisted domain events.

use campus_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// An `events` row joined with its type name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EventRecord {
    pub id: DbId,
    pub event_type: String,
    pub source_entity_type: Option<String>,
    pub source_entity_id: Option<DbId>,
    pub actor_user_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
}

/// Insert DTO for an event. `event_type` must name a seeded `event_types` row.
#[derive(Debug, Clone, Copy)]
pub struct NewEvent<'a> {
    pub event_type: &'a str,
    pub source_entity_type: Option<&'a str>,
    pub source_entity_id: Option<DbId>,
    pub actor_user_id: Option<DbId>,
    pub payload: &'a serde_json::Value,
}
