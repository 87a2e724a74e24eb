//! Repository for the `payments` table.

use campus_core::types::DbId;
use sqlx::{PgConnection, PgExecutor};

use crate::models::payment::{NewPayment, Payment};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, provider, provider_payment_id, status, status_detail, user_id, \
                       course_id, order_id, created_at, updated_at";

/// Provider payment records, keyed by `(provider, provider_payment_id)`.
pub struct PaymentRepo;

impl PaymentRepo {
    /// Insert the payment or, if the provider already reported it, update
    /// its status. Ownership columns are only filled in, never replaced.
    pub async fn upsert(
        conn: &mut PgConnection,
        input: &NewPayment<'_>,
    ) -> Result<Payment, sqlx::Error> {
        let query = format!(
            "INSERT INTO payments
                (provider, provider_payment_id, status, status_detail, user_id, course_id, order_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT ON CONSTRAINT uq_payments_provider_payment_id DO UPDATE SET
                status = EXCLUDED.status,
                status_detail = EXCLUDED.status_detail,
                course_id = COALESCE(payments.course_id, EXCLUDED.course_id),
                order_id = COALESCE(payments.order_id, EXCLUDED.order_id)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Payment>(&query)
            .bind(input.provider)
            .bind(input.provider_payment_id)
            .bind(input.status)
            .bind(input.status_detail)
            .bind(input.user_id)
            .bind(input.course_id)
            .bind(input.order_id)
            .fetch_one(&mut *conn)
            .await
    }

    /// Update the status of a known payment. Returns `None` if no row
    /// exists for `(provider, provider_payment_id)`.
    pub async fn update_status(
        conn: &mut PgConnection,
        provider: &str,
        provider_payment_id: &str,
        status: &str,
        status_detail: Option<&str>,
    ) -> Result<Option<Payment>, sqlx::Error> {
        let query = format!(
            "UPDATE payments SET status = $3, status_detail = $4
             WHERE provider = $1 AND provider_payment_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Payment>(&query)
            .bind(provider)
            .bind(provider_payment_id)
            .bind(status)
            .bind(status_detail)
            .fetch_optional(&mut *conn)
            .await
    }

    /// Find a payment by its provider key.
    pub async fn find_by_provider_id<'e>(
        executor: impl PgExecutor<'e>,
        provider: &str,
        provider_payment_id: &str,
    ) -> Result<Option<Payment>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM payments WHERE provider = $1 AND provider_payment_id = $2"
        );
        sqlx::query_as::<_, Payment>(&query)
            .bind(provider)
            .bind(provider_payment_id)
            .fetch_optional(executor)
            .await
    }

    /// All payments recorded against an order.
    pub async fn list_for_order<'e>(
        executor: impl PgExecutor<'e>,
        order_id: DbId,
    ) -> Result<Vec<Payment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM payments WHERE order_id = $1 ORDER BY id");
        sqlx::query_as::<_, Payment>(&query)
            .bind(order_id)
            .fetch_all(executor)
            .await
    }
}
