//! Enrollment and checkout engine.
//!
//! - [`ledger`]: the per-student-per-course enrollment record.
//! - [`cascade`]: group membership and group-course links, applied to the
//!   ledger one member at a time.
//! - [`orders`]: cart reads and immutable, price-snapshotted orders.
//! - [`checkout`]: the free, card, direct-charge and payment-link paths.
//! - [`reconciler`]: asynchronous provider notifications.
//!
//! Functions that take `&mut PgConnection` run inside the caller's
//! transaction. Functions that take `&AppState` own their transactions and
//! publish the resulting [`PlatformEvent`]s after commit.

pub mod cascade;
pub mod checkout;
pub mod ledger;
pub mod orders;
pub mod reconciler;

use campus_events::{EventBus, PlatformEvent};

use self::ledger::LedgerOutcome;

/// Events produced inside a transaction, held back until it commits.
#[derive(Debug, Default)]
pub struct PendingEvents {
    events: Vec<PlatformEvent>,
}

impl PendingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: PlatformEvent) {
        self.events.push(event);
    }

    /// Queue the event for a ledger change, if it produced one.
    pub fn record(&mut self, outcome: &LedgerOutcome) {
        if let Some(event) = outcome.event() {
            self.events.push(event);
        }
    }

    /// Publish everything queued, in order. Call only after commit.
    pub fn publish(self, bus: &EventBus) {
        bus.publish_all(self.events);
    }
}
