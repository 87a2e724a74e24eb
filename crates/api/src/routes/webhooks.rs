use axum::routing::post;
use axum::Router;

use crate::handlers::webhooks;
use crate::state::AppState;

/// Routes mounted at `/webhooks`. Public: providers cannot authenticate.
pub fn router() -> Router<AppState> {
    Router::new().route("/{provider}", post(webhooks::receive))
}
