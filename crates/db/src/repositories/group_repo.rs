//! Repository for `groups`, `group_members` and `group_courses`.

use campus_core::types::{DbId, Timestamp};
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::models::group::{EntitlingLinkRow, Group, GroupCourse};

/// Column list for `group_courses` queries.
const LINK_COLUMNS: &str =
    "id, group_id, course_id, is_mandatory, due_date, enrolled_by, created_at, updated_at";

/// Group graph persistence: membership and course links.
pub struct GroupRepo;

impl GroupRepo {
    /// Insert a new group, returning the created row.
    pub async fn create(pool: &PgPool, name: &str) -> Result<Group, sqlx::Error> {
        sqlx::query_as::<_, Group>(
            "INSERT INTO groups (name) VALUES ($1)
             RETURNING id, name, created_at, updated_at",
        )
        .bind(name)
        .fetch_one(pool)
        .await
    }

    /// Find a group by ID.
    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<Group>, sqlx::Error> {
        sqlx::query_as::<_, Group>(
            "SELECT id, name, created_at, updated_at FROM groups WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Return which of `ids` exist.
    pub async fn existing_ids<'e>(
        executor: impl PgExecutor<'e>,
        ids: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar("SELECT id FROM groups WHERE id = ANY($1) ORDER BY id")
            .bind(ids)
            .fetch_all(executor)
            .await
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Add a user to a group. Returns `false` if they were already a member.
    pub async fn add_member(
        conn: &mut PgConnection,
        group_id: DbId,
        user_id: DbId,
        added_by: Option<DbId>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO group_members (group_id, user_id, added_by)
             VALUES ($1, $2, $3)
             ON CONFLICT ON CONSTRAINT uq_group_members_group_user DO NOTHING",
        )
        .bind(group_id)
        .bind(user_id)
        .bind(added_by)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Remove a user from a group. Returns `false` if they were not a member.
    pub async fn remove_member(
        conn: &mut PgConnection,
        group_id: DbId,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND user_id = $2")
            .bind(group_id)
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// User ids of every current member of the group.
    pub async fn member_ids<'e>(
        executor: impl PgExecutor<'e>,
        group_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar("SELECT user_id FROM group_members WHERE group_id = $1 ORDER BY user_id")
            .bind(group_id)
            .fetch_all(executor)
            .await
    }

    /// Ids of every group the user belongs to.
    pub async fn group_ids_for_user<'e>(
        executor: impl PgExecutor<'e>,
        user_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT group_id FROM group_members WHERE user_id = $1 ORDER BY group_id",
        )
        .bind(user_id)
        .fetch_all(executor)
        .await
    }

    // -----------------------------------------------------------------------
    // Course links
    // -----------------------------------------------------------------------

    /// Create the group-course link, or update its metadata if it exists.
    /// The link's `created_at` is never changed by an update.
    pub async fn upsert_course_link(
        conn: &mut PgConnection,
        group_id: DbId,
        course_id: DbId,
        is_mandatory: bool,
        due_date: Option<Timestamp>,
        actor: Option<DbId>,
    ) -> Result<GroupCourse, sqlx::Error> {
        let query = format!(
            "INSERT INTO group_courses (group_id, course_id, is_mandatory, due_date, enrolled_by)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT ON CONSTRAINT uq_group_courses_group_course DO UPDATE SET
                is_mandatory = EXCLUDED.is_mandatory,
                due_date = EXCLUDED.due_date,
                enrolled_by = EXCLUDED.enrolled_by
             RETURNING {LINK_COLUMNS}"
        );
        sqlx::query_as::<_, GroupCourse>(&query)
            .bind(group_id)
            .bind(course_id)
            .bind(is_mandatory)
            .bind(due_date)
            .bind(actor)
            .fetch_one(&mut *conn)
            .await
    }

    /// Delete the group's links to `course_ids`, returning the course ids
    /// whose link actually existed.
    pub async fn delete_course_links(
        conn: &mut PgConnection,
        group_id: DbId,
        course_ids: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "DELETE FROM group_courses
             WHERE group_id = $1 AND course_id = ANY($2)
             RETURNING course_id",
        )
        .bind(group_id)
        .bind(course_ids)
        .fetch_all(&mut *conn)
        .await
    }

    /// All course links of a group.
    pub async fn list_course_links(
        pool: &PgPool,
        group_id: DbId,
    ) -> Result<Vec<GroupCourse>, sqlx::Error> {
        let query = format!(
            "SELECT {LINK_COLUMNS} FROM group_courses WHERE group_id = $1 ORDER BY created_at, id"
        );
        sqlx::query_as::<_, GroupCourse>(&query)
            .bind(group_id)
            .fetch_all(pool)
            .await
    }

    /// Ids of the courses linked to any of `group_ids`, each once.
    pub async fn linked_course_ids<'e>(
        executor: impl PgExecutor<'e>,
        group_ids: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT DISTINCT course_id FROM group_courses
             WHERE group_id = ANY($1)
             ORDER BY course_id",
        )
        .bind(group_ids)
        .fetch_all(executor)
        .await
    }

    /// The links that currently entitle the user to the course: links of
    /// the course to any group the user belongs to.
    pub async fn entitling_links(
        conn: &mut PgConnection,
        user_id: DbId,
        course_id: DbId,
    ) -> Result<Vec<EntitlingLinkRow>, sqlx::Error> {
        sqlx::query_as::<_, EntitlingLinkRow>(
            "SELECT gc.group_id, gc.id AS link_id, gc.created_at AS linked_at
             FROM group_courses gc
             JOIN group_members gm ON gm.group_id = gc.group_id
             WHERE gm.user_id = $1 AND gc.course_id = $2",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_all(&mut *conn)
        .await
    }

    /// Whether `group_id` still links `course_id` to `user_id`, share-locking
    /// the membership and link rows until the transaction ends.
    ///
    /// A concurrent membership removal or unlink waits for the caller to
    /// commit, so its own recompute sees whatever the caller wrote.
    pub async fn lock_entitling_link(
        conn: &mut PgConnection,
        group_id: DbId,
        user_id: DbId,
        course_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let found: Option<DbId> = sqlx::query_scalar(
            "SELECT gc.id
             FROM group_members gm
             JOIN group_courses gc ON gc.group_id = gm.group_id
             WHERE gm.group_id = $1 AND gm.user_id = $2 AND gc.course_id = $3
             FOR SHARE OF gm, gc",
        )
        .bind(group_id)
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(found.is_some())
    }
}
