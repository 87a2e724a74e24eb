//! Cart item classification for the checkout paths.
//!
//! Each checkout path only takes the cart items it can settle. Free items
//! (zero-priced, no provider price configured) are settled by every path
//! immediately; paid items are settled by the provider the path targets.
//! Whatever a path cannot settle stays in the cart.

use serde::{Deserialize, Serialize};

use crate::order::PricedCourse;
use crate::types::{Cents, DbId};

/// A cart row joined with the course's live catalog pricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutItem {
    pub course_id: DbId,
    pub title: String,
    pub price_in_cents: Cents,
    pub currency: String,
    /// Card-network price reference, when the course is sold by card.
    pub stripe_price_id: Option<String>,
}

impl CheckoutItem {
    /// Zero-priced with no provider product configured.
    pub fn is_free(&self) -> bool {
        self.price_in_cents == 0 && self.stripe_price_id.is_none()
    }

    /// The pricing fields used to snapshot an order line.
    pub fn priced(&self) -> PricedCourse {
        PricedCourse {
            course_id: self.course_id,
            price_in_cents: self.price_in_cents,
            currency: self.currency.clone(),
        }
    }
}

/// The checkout path a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutPath {
    /// Only free items; completes synchronously.
    Free,
    /// Client-side card session; paid items need a configured card price.
    Card,
    /// Synchronous token charge.
    DirectCharge,
    /// Hosted payment page.
    PaymentLink,
}

/// Cart items split by how a checkout path handles them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutPartition {
    /// Settled immediately with a free order.
    pub free: Vec<CheckoutItem>,
    /// Settled through the payment provider.
    pub payable: Vec<CheckoutItem>,
    /// Not settleable by this path; left in the cart.
    pub skipped: Vec<CheckoutItem>,
}

impl CheckoutPartition {
    pub fn is_empty(&self) -> bool {
        self.free.is_empty() && self.payable.is_empty()
    }

    /// Course ids of the paid items, in cart order.
    pub fn payable_course_ids(&self) -> Vec<DbId> {
        self.payable.iter().map(|i| i.course_id).collect()
    }
}

/// Split cart items for the given checkout path.
pub fn partition(items: Vec<CheckoutItem>, path: CheckoutPath) -> CheckoutPartition {
    let mut out = CheckoutPartition::default();
    for item in items {
        if item.is_free() {
            out.free.push(item);
            continue;
        }
        let payable = match path {
            CheckoutPath::Free => false,
            CheckoutPath::Card => item.price_in_cents > 0 && item.stripe_price_id.is_some(),
            CheckoutPath::DirectCharge | CheckoutPath::PaymentLink => item.price_in_cents > 0,
        };
        if payable {
            out.payable.push(item);
        } else {
            out.skipped.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(course_id: DbId, cents: Cents, stripe: Option<&str>) -> CheckoutItem {
        CheckoutItem {
            course_id,
            title: format!("Course {course_id}"),
            price_in_cents: cents,
            currency: "USD".to_string(),
            stripe_price_id: stripe.map(str::to_string),
        }
    }

    #[test]
    fn free_requires_zero_price_and_no_provider_price() {
        assert!(item(1, 0, None).is_free());
        assert!(!item(1, 0, Some("price_1")).is_free());
        assert!(!item(1, 100, None).is_free());
    }

    #[test]
    fn free_path_skips_every_paid_item() {
        let p = partition(
            vec![item(1, 0, None), item(2, 1999, Some("price_2")), item(3, 500, None)],
            CheckoutPath::Free,
        );
        assert_eq!(p.free.len(), 1);
        assert!(p.payable.is_empty());
        assert_eq!(p.skipped.len(), 2);
    }

    #[test]
    fn card_path_needs_a_card_price() {
        let p = partition(
            vec![item(1, 0, None), item(2, 1999, Some("price_2")), item(3, 500, None)],
            CheckoutPath::Card,
        );
        assert_eq!(p.free[0].course_id, 1);
        assert_eq!(p.payable_course_ids(), vec![2]);
        assert_eq!(p.skipped[0].course_id, 3);
    }

    #[test]
    fn charge_and_link_paths_take_every_priced_item() {
        for path in [CheckoutPath::DirectCharge, CheckoutPath::PaymentLink] {
            let p = partition(
                vec![item(2, 1999, Some("price_2")), item(3, 500, None)],
                path,
            );
            assert_eq!(p.payable_course_ids(), vec![2, 3]);
            assert!(p.skipped.is_empty());
        }
    }

    #[test]
    fn zero_priced_item_with_card_price_is_never_settled() {
        let p = partition(vec![item(4, 0, Some("price_4"))], CheckoutPath::Card);
        assert!(p.is_empty());
        assert_eq!(p.skipped.len(), 1);
    }
}
