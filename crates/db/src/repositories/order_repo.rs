//! Repository for the `orders` and `order_items` tables.

use campus_core::order::OrderSnapshot;
use campus_core::status::OrderStatus;
use campus_core::types::DbId;
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::models::order::{Order, OrderItem, OrderWithItems};

/// Column list for `orders` queries.
const COLUMNS: &str = "id, user_id, status_id, provider, total_amount_in_cents, currency, \
                       provider_payment_id, payment_url, created_at, updated_at";

/// Column list for `order_items` queries.
const ITEM_COLUMNS: &str = "id, order_id, course_id, price_in_cents, currency, created_at";

/// Order ledger persistence.
pub struct OrderRepo;

impl OrderRepo {
    /// Insert an order in `pending` and attach its item snapshot.
    pub async fn create(
        conn: &mut PgConnection,
        user_id: DbId,
        provider: &str,
        snapshot: &OrderSnapshot,
    ) -> Result<OrderWithItems, sqlx::Error> {
        let query = format!(
            "INSERT INTO orders (user_id, status_id, provider, total_amount_in_cents, currency)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        let order = sqlx::query_as::<_, Order>(&query)
            .bind(user_id)
            .bind(OrderStatus::Pending.id())
            .bind(provider)
            .bind(snapshot.total_amount_in_cents)
            .bind(&snapshot.currency)
            .fetch_one(&mut *conn)
            .await?;

        let item_query = format!(
            "INSERT INTO order_items (order_id, course_id, price_in_cents, currency)
             VALUES ($1, $2, $3, $4)
             RETURNING {ITEM_COLUMNS}"
        );
        let mut items = Vec::with_capacity(snapshot.lines.len());
        for line in &snapshot.lines {
            let item = sqlx::query_as::<_, OrderItem>(&item_query)
                .bind(order.id)
                .bind(line.course_id)
                .bind(line.price_in_cents)
                .bind(&line.currency)
                .fetch_one(&mut *conn)
                .await?;
            items.push(item);
        }

        Ok(OrderWithItems { order, items })
    }

    /// Find an order by ID.
    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<Order>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM orders WHERE id = $1");
        sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Find and row-lock an order.
    pub async fn find_for_update(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<Order>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    }

    /// The item snapshot of an order.
    pub async fn list_items<'e>(
        executor: impl PgExecutor<'e>,
        order_id: DbId,
    ) -> Result<Vec<OrderItem>, sqlx::Error> {
        let query =
            format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id");
        sqlx::query_as::<_, OrderItem>(&query)
            .bind(order_id)
            .fetch_all(executor)
            .await
    }

    /// A user's orders, newest first.
    pub async fn list_for_user(pool: &PgPool, user_id: DbId) -> Result<Vec<Order>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Order>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Move an order to `target` if its current status allows it.
    ///
    /// Returns `None` when the order is missing or the transition is not
    /// allowed from its current status (e.g. it is already `completed`).
    pub async fn transition(
        conn: &mut PgConnection,
        id: DbId,
        target: OrderStatus,
    ) -> Result<Option<Order>, sqlx::Error> {
        let query = format!(
            "UPDATE orders SET status_id = $2
             WHERE id = $1 AND status_id = ANY($3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .bind(target.id())
            .bind(OrderStatus::allowed_sources(target))
            .fetch_optional(&mut *conn)
            .await
    }

    /// Record the provider's session/payment id and hosted page URL.
    /// Values already set are kept when `None` is passed.
    pub async fn set_provider_refs(
        conn: &mut PgConnection,
        id: DbId,
        provider_payment_id: Option<&str>,
        payment_url: Option<&str>,
    ) -> Result<Order, sqlx::Error> {
        let query = format!(
            "UPDATE orders SET
                provider_payment_id = COALESCE($2, provider_payment_id),
                payment_url = COALESCE($3, payment_url)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .bind(provider_payment_id)
            .bind(payment_url)
            .fetch_one(&mut *conn)
            .await
    }
}
