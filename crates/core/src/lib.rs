//! Pure domain logic for the enrollment and checkout engine.
//!
//! Nothing in this crate performs I/O. The `db` crate loads rows, the
//! planners here decide what should change, and the `api` engine applies
//! the decisions inside the caller's transaction.

pub mod checkout;
pub mod enrollment;
pub mod error;
pub mod order;
pub mod roles;
pub mod status;
pub mod types;
pub mod webhook;
