//! Route definitions for `/admin`.

use axum::routing::{delete, post, put};
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// ```text
/// POST   /courses/{id}/enrollments                   -> bulk_enroll
/// DELETE /courses/{id}/enrollments/{user_id}         -> unenroll
///
/// DELETE /groups/{id}/courses                        -> unlink_courses
/// PUT    /groups/{id}/courses/{course_id}            -> link_course
/// POST   /groups/{id}/members                        -> add_member
/// DELETE /groups/{id}/members/{user_id}              -> remove_member
///
/// PUT    /users/{id}/groups                          -> set_user_groups
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/courses/{id}/enrollments", post(admin::bulk_enroll))
        .route("/courses/{id}/enrollments/{user_id}", delete(admin::unenroll))
        .route("/groups/{id}/courses", delete(admin::unlink_courses))
        .route("/groups/{id}/courses/{course_id}", put(admin::link_course))
        .route("/groups/{id}/members", post(admin::add_member))
        .route("/groups/{id}/members/{user_id}", delete(admin::remove_member))
        .route("/users/{id}/groups", put(admin::set_user_groups))
}
