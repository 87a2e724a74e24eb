use axum::routing::get;
use axum::Router;

use crate::handlers::enrollments;
use crate::state::AppState;

/// Routes mounted at `/enrollments`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(enrollments::list))
        .route("/{course_id}", get(enrollments::get_by_course))
}
