use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::cart;
use crate::state::AppState;

/// Routes mounted at `/cart`.
///
/// ```text
/// GET    /                     -> list
/// POST   /items                -> add
/// DELETE /items/{course_id}    -> remove
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::list))
        .route("/items", post(cart::add))
        .route("/items/{course_id}", delete(cart::remove))
}
