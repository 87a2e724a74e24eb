//! Cart models.

use campus_core::checkout::CheckoutItem;
use campus_core::types::{Cents, DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `cart_items` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CartItem {
    pub id: DbId,
    pub user_id: DbId,
    pub course_id: DbId,
    pub created_at: Timestamp,
}

/// A cart row joined with the course's current pricing.
#[derive(Debug, Clone, FromRow)]
pub struct CheckoutRow {
    pub course_id: DbId,
    pub title: String,
    pub price_in_cents: Cents,
    pub currency: String,
    pub stripe_price_id: Option<String>,
}

impl From<CheckoutRow> for CheckoutItem {
    fn from(row: CheckoutRow) -> Self {
        CheckoutItem {
            course_id: row.course_id,
            title: row.title,
            price_in_cents: row.price_in_cents,
            currency: row.currency,
            stripe_price_id: row.stripe_price_id,
        }
    }
}
