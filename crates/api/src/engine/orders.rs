//! Cart reads and price-snapshotted orders.

use campus_core::checkout::CheckoutItem;
use campus_core::enrollment::{EnrollMode, EnrollmentSource};
use campus_core::error::CoreError;
use campus_core::order::{snapshot_order, PricedCourse};
use campus_core::status::OrderStatus;
use campus_core::types::DbId;
use campus_db::models::cart::CartItem;
use campus_db::models::order::{Order, OrderWithItems};
use campus_db::repositories::{CartRepo, CourseRepo, EnrollmentRepo, OrderRepo};
use campus_db::DbPool;
use campus_events::PlatformEvent;
use campus_payments::ProviderKind;
use sqlx::{PgConnection, PgExecutor};

use super::{ledger, PendingEvents};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;

/// The student's cart joined with live catalog pricing.
pub async fn get_checkout_items(pool: &DbPool, user_id: DbId) -> AppResult<Vec<CheckoutItem>> {
    let rows = CartRepo::checkout_rows(pool, user_id).await?;
    Ok(rows.into_iter().map(CheckoutItem::from).collect())
}

/// Put a course in the student's cart. Adding it twice is a no-op.
pub async fn add_to_cart(pool: &DbPool, user_id: DbId, course_id: DbId) -> AppResult<CartItem> {
    CourseRepo::find_by_id(pool, course_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Course",
            id: course_id,
        }))?;
    ensure_not_enrolled(pool, user_id, &[course_id]).await?;
    Ok(CartRepo::add(pool, user_id, course_id).await?)
}

pub async fn remove_from_cart(pool: &DbPool, user_id: DbId, course_id: DbId) -> AppResult<()> {
    if CartRepo::remove(pool, user_id, course_id).await? {
        Ok(())
    } else {
        Err(AppError::Core(CoreError::NotFound {
            entity: "CartItem",
            id: course_id,
        }))
    }
}

/// Reject a paid checkout naming courses the student is already enrolled in.
pub async fn ensure_not_enrolled<'e>(
    executor: impl PgExecutor<'e>,
    user_id: DbId,
    course_ids: &[DbId],
) -> AppResult<()> {
    if course_ids.is_empty() {
        return Ok(());
    }
    let enrolled = EnrollmentRepo::enrolled_course_ids(executor, user_id, course_ids).await?;
    if enrolled.is_empty() {
        Ok(())
    } else {
        Err(AppError::Core(CoreError::AlreadyEnrolled {
            course_ids: enrolled,
        }))
    }
}

/// Insert a `pending` order whose items and total are snapshotted from
/// the given catalog prices.
pub async fn create_order(
    conn: &mut PgConnection,
    user_id: DbId,
    provider: ProviderKind,
    items: &[CheckoutItem],
) -> AppResult<OrderWithItems> {
    let priced: Vec<PricedCourse> = items.iter().map(CheckoutItem::priced).collect();
    let snapshot = snapshot_order(&priced)?;
    let created = OrderRepo::create(conn, user_id, provider.as_str(), &snapshot).await?;
    tracing::info!(
        order_id = created.order.id,
        user_id,
        provider = %provider,
        total = created.order.total_amount_in_cents,
        items = created.items.len(),
        "Order created",
    );
    Ok(created)
}

/// Apply a guarded status change that must succeed.
pub async fn transition(
    conn: &mut PgConnection,
    order_id: DbId,
    target: OrderStatus,
) -> AppResult<Order> {
    OrderRepo::transition(conn, order_id, target)
        .await?
        .ok_or_else(|| {
            AppError::InternalError(format!(
                "Order {order_id} cannot move to {}",
                target.as_str()
            ))
        })
}

/// Settle an order whose payment is confirmed.
///
/// Moves the order to `completed` when its status allows it, enrolls the
/// owner directly in every item, and clears those courses from the cart.
/// Safe to call again for the same order: nothing is written twice.
/// Returns the course ids of the order.
pub async fn complete_order(
    conn: &mut PgConnection,
    order_id: DbId,
    payment_id: Option<&str>,
    events: &mut PendingEvents,
) -> AppResult<Vec<DbId>> {
    let order = OrderRepo::find_for_update(&mut *conn, order_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Order",
            id: order_id,
        }))?;

    match OrderRepo::transition(&mut *conn, order_id, OrderStatus::Completed).await? {
        Some(completed) => {
            tracing::info!(order_id, user_id = completed.user_id, "Order completed");
            events.push(PlatformEvent::order_completed(
                completed.id,
                completed.user_id,
                &completed.provider,
            ));
        }
        None if order.status() == Some(OrderStatus::Completed) => {
            tracing::debug!(order_id, "Order already completed");
        }
        None => {
            tracing::warn!(
                order_id,
                status = ?order.status(),
                "Confirmed payment for an order that cannot complete",
            );
        }
    }

    let items = OrderRepo::list_items(&mut *conn, order_id).await?;
    let course_ids: Vec<DbId> = items.iter().map(|i| i.course_id).collect();
    for &course_id in &course_ids {
        let outcome = ledger::enroll(
            &mut *conn,
            order.user_id,
            course_id,
            EnrollmentSource::Direct,
            payment_id,
            EnrollMode::Idempotent,
        )
        .await?;
        events.record(&outcome);
    }
    CartRepo::remove_courses(&mut *conn, order.user_id, &course_ids).await?;

    Ok(course_ids)
}

/// An order with its items, visible to its owner and to admins.
pub async fn get_order(
    pool: &DbPool,
    viewer: &AuthUser,
    order_id: DbId,
) -> AppResult<OrderWithItems> {
    let order = OrderRepo::find_by_id(pool, order_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Order",
            id: order_id,
        }))?;
    viewer.ensure_can_view(order.user_id, "Order")?;
    let items = OrderRepo::list_items(pool, order_id).await?;
    Ok(OrderWithItems { order, items })
}

pub async fn list_orders(pool: &DbPool, user_id: DbId) -> AppResult<Vec<Order>> {
    Ok(OrderRepo::list_for_user(pool, user_id).await?)
}
