//! Repository for the `courses` table and its chapter/lesson outline.

use campus_core::types::{Cents, DbId};
use sqlx::{PgExecutor, PgPool};

use crate::models::course::{Chapter, Course, CreateCourse, Lesson};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, title, price_in_cents, currency, stripe_price_id, created_at, updated_at";

/// Catalog reads and the few writes the engine's callers need.
pub struct CourseRepo;

impl CourseRepo {
    /// Insert a new course, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateCourse) -> Result<Course, sqlx::Error> {
        let query = format!(
            "INSERT INTO courses (title, price_in_cents, currency, stripe_price_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Course>(&query)
            .bind(&input.title)
            .bind(input.price_in_cents)
            .bind(&input.currency)
            .bind(&input.stripe_price_id)
            .fetch_one(pool)
            .await
    }

    /// Find a course by ID.
    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<Course>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM courses WHERE id = $1");
        sqlx::query_as::<_, Course>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Change a course's live price. Existing order snapshots are unaffected.
    pub async fn update_price(
        pool: &PgPool,
        id: DbId,
        price_in_cents: Cents,
        stripe_price_id: Option<&str>,
    ) -> Result<Option<Course>, sqlx::Error> {
        let query = format!(
            "UPDATE courses SET price_in_cents = $2, stripe_price_id = $3
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Course>(&query)
            .bind(id)
            .bind(price_in_cents)
            .bind(stripe_price_id)
            .fetch_optional(pool)
            .await
    }

    /// Append a chapter to a course outline.
    pub async fn add_chapter(
        pool: &PgPool,
        course_id: DbId,
        title: &str,
        position: i32,
    ) -> Result<Chapter, sqlx::Error> {
        sqlx::query_as::<_, Chapter>(
            "INSERT INTO chapters (course_id, title, position)
             VALUES ($1, $2, $3)
             RETURNING id, course_id, title, position, created_at",
        )
        .bind(course_id)
        .bind(title)
        .bind(position)
        .fetch_one(pool)
        .await
    }

    /// Append a lesson to a chapter.
    pub async fn add_lesson(
        pool: &PgPool,
        chapter_id: DbId,
        title: &str,
        position: i32,
    ) -> Result<Lesson, sqlx::Error> {
        sqlx::query_as::<_, Lesson>(
            "INSERT INTO lessons (chapter_id, title, position)
             VALUES ($1, $2, $3)
             RETURNING id, chapter_id, title, position, created_at",
        )
        .bind(chapter_id)
        .bind(title)
        .bind(position)
        .fetch_one(pool)
        .await
    }
}
