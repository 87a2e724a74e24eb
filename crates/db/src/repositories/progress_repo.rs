//! Bulk initialization of chapter and lesson progress rows.

use campus_core::types::DbId;
use sqlx::{PgConnection, PgPool};

/// Rows created by [`ProgressRepo::initialize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressInit {
    pub chapters: u64,
    pub lessons: u64,
}

/// Progress subsystem entry points used by the enrollment ledger.
pub struct ProgressRepo;

impl ProgressRepo {
    /// Create one progress row per chapter and lesson of the course.
    /// Rows that already exist are left untouched.
    pub async fn initialize(
        conn: &mut PgConnection,
        user_id: DbId,
        course_id: DbId,
    ) -> Result<ProgressInit, sqlx::Error> {
        let chapters = sqlx::query(
            "INSERT INTO chapter_progress (user_id, chapter_id)
             SELECT $1, ch.id FROM chapters ch WHERE ch.course_id = $2
             ON CONFLICT ON CONSTRAINT uq_chapter_progress_user_chapter DO NOTHING",
        )
        .bind(user_id)
        .bind(course_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        let lessons = sqlx::query(
            "INSERT INTO lesson_progress (user_id, lesson_id)
             SELECT $1, l.id FROM lessons l
             JOIN chapters ch ON ch.id = l.chapter_id
             WHERE ch.course_id = $2
             ON CONFLICT ON CONSTRAINT uq_lesson_progress_user_lesson DO NOTHING",
        )
        .bind(user_id)
        .bind(course_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        Ok(ProgressInit { chapters, lessons })
    }

    /// Count a student's `(chapter, lesson)` progress rows for a course.
    pub async fn count_for_course(
        pool: &PgPool,
        user_id: DbId,
        course_id: DbId,
    ) -> Result<(i64, i64), sqlx::Error> {
        sqlx::query_as(
            "SELECT
                (SELECT COUNT(*) FROM chapter_progress cp
                 JOIN chapters ch ON ch.id = cp.chapter_id
                 WHERE cp.user_id = $1 AND ch.course_id = $2),
                (SELECT COUNT(*) FROM lesson_progress lp
                 JOIN lessons l ON l.id = lp.lesson_id
                 JOIN chapters ch ON ch.id = l.chapter_id
                 WHERE lp.user_id = $1 AND ch.course_id = $2)",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(pool)
        .await
    }
}
