//! Well-known role name constants.
//!
//! These must match the `CHECK` constraint on `users.role` in
//! `20260301000001_create_users_and_courses.sql`.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_STUDENT: &str = "student";

/// Every role a token may carry.
pub const ALL_ROLES: [&str; 2] = [ROLE_ADMIN, ROLE_STUDENT];
