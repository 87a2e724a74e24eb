pub mod admin;
pub mod cart;
pub mod checkout;
pub mod enrollments;
pub mod orders;
pub mod webhooks;
