//! Repository for the `cart_items` table.

use campus_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::cart::{CartItem, CheckoutRow};

/// Cart reads and writes.
pub struct CartRepo;

impl CartRepo {
    /// Add a course to the user's cart. Adding it twice returns the
    /// existing row.
    pub async fn add(
        pool: &PgPool,
        user_id: DbId,
        course_id: DbId,
    ) -> Result<CartItem, sqlx::Error> {
        sqlx::query_as::<_, CartItem>(
            "INSERT INTO cart_items (user_id, course_id)
             VALUES ($1, $2)
             ON CONFLICT ON CONSTRAINT uq_cart_items_user_course
                DO UPDATE SET course_id = EXCLUDED.course_id
             RETURNING id, user_id, course_id, created_at",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(pool)
        .await
    }

    /// Remove one course from the cart. Returns `true` if it was there.
    pub async fn remove(
        pool: &PgPool,
        user_id: DbId,
        course_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND course_id = $2")
            .bind(user_id)
            .bind(course_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove the checked-out courses from the cart, leaving the rest.
    pub async fn remove_courses(
        conn: &mut PgConnection,
        user_id: DbId,
        course_ids: &[DbId],
    ) -> Result<u64, sqlx::Error> {
        if course_ids.is_empty() {
            return Ok(0);
        }
        let result =
            sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND course_id = ANY($2)")
                .bind(user_id)
                .bind(course_ids)
                .execute(&mut *conn)
                .await?;
        Ok(result.rows_affected())
    }

    /// Cart rows joined with the courses' live pricing, oldest first.
    pub async fn checkout_rows(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<CheckoutRow>, sqlx::Error> {
        sqlx::query_as::<_, CheckoutRow>(
            "SELECT c.id AS course_id, c.title, c.price_in_cents, c.currency, c.stripe_price_id
             FROM cart_items ci
             JOIN courses c ON c.id = ci.course_id
             WHERE ci.user_id = $1
             ORDER BY ci.created_at, ci.id",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
