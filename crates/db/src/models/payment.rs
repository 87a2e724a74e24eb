//! Provider payment model.

use campus_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `payments` table, unique on `(provider, provider_payment_id)`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub id: DbId,
    pub provider: String,
    pub provider_payment_id: String,
    pub status: String,
    pub status_detail: Option<String>,
    pub user_id: DbId,
    pub course_id: Option<DbId>,
    pub order_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Values written by [`PaymentRepo::upsert`](crate::repositories::PaymentRepo::upsert).
#[derive(Debug, Clone)]
pub struct NewPayment<'a> {
    pub provider: &'a str,
    pub provider_payment_id: &'a str,
    pub status: &'a str,
    pub status_detail: Option<&'a str>,
    pub user_id: DbId,
    pub course_id: Option<DbId>,
    pub order_id: Option<DbId>,
}
