//! Course catalog models: courses and their chapter/lesson outline.

use campus_core::types::{Cents, DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `courses` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Course {
    pub id: DbId,
    pub title: String,
    pub price_in_cents: Cents,
    pub currency: String,
    pub stripe_price_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a course.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCourse {
    pub title: String,
    pub price_in_cents: Cents,
    pub currency: String,
    pub stripe_price_id: Option<String>,
}

/// A row from the `chapters` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Chapter {
    pub id: DbId,
    pub course_id: DbId,
    pub title: String,
    pub position: i32,
    pub created_at: Timestamp,
}

/// A row from the `lessons` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Lesson {
    pub id: DbId,
    pub chapter_id: DbId,
    pub title: String,
    pub position: i32,
    pub created_at: Timestamp,
}
