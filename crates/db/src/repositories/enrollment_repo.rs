//! Repository for the `enrollments` table.
//!
//! Writes are keyed on `uq_enrollments_user_course`, so two operations
//! racing to enroll the same student+course pair converge on one row: the
//! loser's insert becomes an update instead of an error.

use campus_core::status::EnrollmentStatus;
use campus_core::types::DbId;
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::models::enrollment::Enrollment;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, course_id, status_id, enrolled_by_group_id, payment_id, \
                       enrolled_at, progress_initialized_at, created_at, updated_at";

/// Enrollment ledger persistence.
pub struct EnrollmentRepo;

impl EnrollmentRepo {
    /// Find the record for a student+course pair, in any status.
    pub async fn find<'e>(
        executor: impl PgExecutor<'e>,
        user_id: DbId,
        course_id: DbId,
    ) -> Result<Option<Enrollment>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM enrollments WHERE user_id = $1 AND course_id = $2");
        sqlx::query_as::<_, Enrollment>(&query)
            .bind(user_id)
            .bind(course_id)
            .fetch_optional(executor)
            .await
    }

    /// Find and row-lock the record for a student+course pair.
    pub async fn find_for_update(
        conn: &mut PgConnection,
        user_id: DbId,
        course_id: DbId,
    ) -> Result<Option<Enrollment>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM enrollments
             WHERE user_id = $1 AND course_id = $2
             FOR UPDATE"
        );
        sqlx::query_as::<_, Enrollment>(&query)
            .bind(user_id)
            .bind(course_id)
            .fetch_optional(&mut *conn)
            .await
    }

    /// List a student's `ENROLLED` records, most recent first.
    pub async fn list_enrolled(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<Enrollment>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM enrollments
             WHERE user_id = $1 AND status_id = $2
             ORDER BY enrolled_at DESC, id DESC"
        );
        sqlx::query_as::<_, Enrollment>(&query)
            .bind(user_id)
            .bind(EnrollmentStatus::Enrolled.id())
            .fetch_all(pool)
            .await
    }

    /// Which of `course_ids` the student is currently enrolled in.
    pub async fn enrolled_course_ids<'e>(
        executor: impl PgExecutor<'e>,
        user_id: DbId,
        course_ids: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT course_id FROM enrollments
             WHERE user_id = $1 AND course_id = ANY($2) AND status_id = $3
             ORDER BY course_id",
        )
        .bind(user_id)
        .bind(course_ids)
        .bind(EnrollmentStatus::Enrolled.id())
        .fetch_all(executor)
        .await
    }

    /// Which of `user_ids` are currently enrolled in the course.
    pub async fn enrolled_user_ids(
        conn: &mut PgConnection,
        course_id: DbId,
        user_ids: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT user_id FROM enrollments
             WHERE course_id = $1 AND user_id = ANY($2) AND status_id = $3
             ORDER BY user_id",
        )
        .bind(course_id)
        .bind(user_ids)
        .bind(EnrollmentStatus::Enrolled.id())
        .fetch_all(&mut *conn)
        .await
    }

    /// Ensure the pair is `ENROLLED` with the given attribution.
    ///
    /// Inserts the record or updates it in place. `enrolled_at` is kept
    /// when the record was already enrolled, and an existing `payment_id`
    /// is kept when none is supplied. A direct record is never turned into
    /// a group-sourced one: when the conflict guard skips the update, the
    /// current row is returned unchanged.
    pub async fn upsert_enrolled(
        conn: &mut PgConnection,
        user_id: DbId,
        course_id: DbId,
        group_id: Option<DbId>,
        payment_id: Option<&str>,
    ) -> Result<Enrollment, sqlx::Error> {
        let query = format!(
            "INSERT INTO enrollments
                (user_id, course_id, status_id, enrolled_by_group_id, payment_id, enrolled_at)
             VALUES ($1, $2, $3, $4, $5, NOW())
             ON CONFLICT ON CONSTRAINT uq_enrollments_user_course DO UPDATE SET
                status_id = EXCLUDED.status_id,
                enrolled_by_group_id = EXCLUDED.enrolled_by_group_id,
                payment_id = COALESCE(EXCLUDED.payment_id, enrollments.payment_id),
                enrolled_at = CASE
                    WHEN enrollments.status_id = EXCLUDED.status_id THEN enrollments.enrolled_at
                    ELSE NOW()
                END
             WHERE NOT (
                enrollments.status_id = EXCLUDED.status_id
                AND enrollments.enrolled_by_group_id IS NULL
                AND EXCLUDED.enrolled_by_group_id IS NOT NULL
             )
             RETURNING {COLUMNS}"
        );
        let written = sqlx::query_as::<_, Enrollment>(&query)
            .bind(user_id)
            .bind(course_id)
            .bind(EnrollmentStatus::Enrolled.id())
            .bind(group_id)
            .bind(payment_id)
            .fetch_optional(&mut *conn)
            .await?;

        match written {
            Some(row) => Ok(row),
            None => {
                tracing::debug!(user_id, course_id, "Direct enrollment kept over group source");
                Self::find(&mut *conn, user_id, course_id)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)
            }
        }
    }

    /// Re-attribute an enrolled record to a group, or to direct with `None`.
    pub async fn set_source(
        conn: &mut PgConnection,
        id: DbId,
        group_id: Option<DbId>,
    ) -> Result<Enrollment, sqlx::Error> {
        let query = format!(
            "UPDATE enrollments SET enrolled_by_group_id = $2
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Enrollment>(&query)
            .bind(id)
            .bind(group_id)
            .fetch_one(&mut *conn)
            .await
    }

    /// Set the record `NOT_ENROLLED` and clear its attribution and
    /// enrollment timestamp. The row itself is kept.
    pub async fn mark_not_enrolled(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Enrollment, sqlx::Error> {
        let query = format!(
            "UPDATE enrollments
             SET status_id = $2, enrolled_by_group_id = NULL, enrolled_at = NULL
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Enrollment>(&query)
            .bind(id)
            .bind(EnrollmentStatus::NotEnrolled.id())
            .fetch_one(&mut *conn)
            .await
    }

    /// Insert a `not_enrolled` record for the pair unless one exists.
    ///
    /// Returns `true` when this call inserted it. When another transaction
    /// holds an uncommitted record for the pair, waits for it to finish.
    pub async fn reserve(
        conn: &mut PgConnection,
        user_id: DbId,
        course_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO enrollments (user_id, course_id, status_id)
             VALUES ($1, $2, $3)
             ON CONFLICT ON CONSTRAINT uq_enrollments_user_course DO NOTHING",
        )
        .bind(user_id)
        .bind(course_id)
        .bind(EnrollmentStatus::NotEnrolled.id())
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Claim the one-time progress initialization for a record.
    ///
    /// Returns `true` exactly once per record, for the caller that must
    /// create the progress rows.
    pub async fn claim_progress_initialization(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE enrollments SET progress_initialized_at = NOW()
             WHERE id = $1 AND progress_initialized_at IS NULL",
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
