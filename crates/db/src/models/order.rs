//! Order and order item models.

use campus_core::status::{OrderStatus, StatusId};
use campus_core::types::{Cents, DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `orders` table.
///
/// Only `status_id`, `provider_payment_id` and `payment_url` change after
/// the items are attached.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub id: DbId,
    pub user_id: DbId,
    pub status_id: StatusId,
    pub provider: String,
    pub total_amount_in_cents: Cents,
    pub currency: String,
    pub provider_payment_id: Option<String>,
    pub payment_url: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Order {
    pub fn status(&self) -> Option<OrderStatus> {
        OrderStatus::from_id(self.status_id)
    }
}

/// A row from the `order_items` table: the price snapshot of one course.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderItem {
    pub id: DbId,
    pub order_id: DbId,
    pub course_id: DbId,
    pub price_in_cents: Cents,
    pub currency: String,
    pub created_at: Timestamp,
}

/// An order together with its item snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}
