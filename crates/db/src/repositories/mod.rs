//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods.
//! Reads take `&PgPool` (or any `PgExecutor` when they are also needed
//! inside a transaction); engine writes take `&mut PgConnection`.

pub mod cart_repo;
pub mod course_repo;
pub mod enrollment_repo;
pub mod event_repo;
pub mod group_repo;
pub mod order_repo;
pub mod payment_repo;
pub mod progress_repo;
pub mod user_repo;

pub use cart_repo::CartRepo;
pub use course_repo::CourseRepo;
pub use enrollment_repo::EnrollmentRepo;
pub use event_repo::EventRepo;
pub use group_repo::GroupRepo;
pub use order_repo::OrderRepo;
pub use payment_repo::PaymentRepo;
pub use progress_repo::{ProgressInit, ProgressRepo};
pub use user_repo::UserRepo;
