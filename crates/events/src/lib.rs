//! Domain event bus for the enrollment and checkout engine.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the canonical domain event envelope, with
//!   constructors for the enrollment, order and payment events.
//! - [`EventPersistence`]: background subscriber that writes every
//!   event to the `events` table.
//!
//! Publication is fire-and-forget: callers publish after their transaction
//! commits and never wait on delivery.

pub mod bus;
pub mod persistence;

pub use bus::{EventBus, PlatformEvent};
pub use persistence::EventPersistence;
