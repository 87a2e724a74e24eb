//! Order pricing and snapshot rules.
//!
//! An order's items carry the course price as it was at creation time and
//! the order total is always derived here from those snapshots, never taken
//! from the client.

use serde::Serialize;

use crate::error::CoreError;
use crate::types::{Cents, DbId};

/// Order provider tag: `stripe`.
pub const PROVIDER_STRIPE: &str = "stripe";
/// Order provider tag: `mercadopago`.
pub const PROVIDER_MERCADOPAGO: &str = "mercadopago";
/// Order provider tag: `free`.
pub const PROVIDER_FREE: &str = "free";

/// One priced course as read from the catalog at checkout time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedCourse {
    pub course_id: DbId,
    pub price_in_cents: Cents,
    pub currency: String,
}

/// One immutable line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    pub course_id: DbId,
    pub price_in_cents: Cents,
    pub currency: String,
}

/// The fully priced content of a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSnapshot {
    pub lines: Vec<OrderLine>,
    pub total_amount_in_cents: Cents,
    pub currency: String,
}

/// Build the snapshot for a new order from live catalog prices.
///
/// Rejects an empty item list, duplicate courses, negative prices, and
/// mixed currencies (currency is passed through, never converted).
pub fn snapshot_order(items: &[PricedCourse]) -> Result<OrderSnapshot, CoreError> {
    let first = items.first().ok_or(CoreError::EmptyCart)?;
    let currency = first.currency.clone();

    let mut lines: Vec<OrderLine> = Vec::with_capacity(items.len());
    let mut total: Cents = 0;

    for item in items {
        if item.price_in_cents < 0 {
            return Err(CoreError::Validation(format!(
                "Course {} has a negative price",
                item.course_id
            )));
        }
        if item.currency != currency {
            return Err(CoreError::Validation(format!(
                "Order mixes currencies '{currency}' and '{}'",
                item.currency
            )));
        }
        if lines.iter().any(|l| l.course_id == item.course_id) {
            return Err(CoreError::Validation(format!(
                "Course {} appears more than once",
                item.course_id
            )));
        }
        total = total.checked_add(item.price_in_cents).ok_or_else(|| {
            CoreError::Validation("Order total overflows".to_string())
        })?;
        lines.push(OrderLine {
            course_id: item.course_id,
            price_in_cents: item.price_in_cents,
            currency: item.currency.clone(),
        });
    }

    Ok(OrderSnapshot {
        lines,
        total_amount_in_cents: total,
        currency,
    })
}
