use axum::routing::post;
use axum::Router;

use crate::handlers::checkout;
use crate::state::AppState;

/// Routes mounted at `/checkout`.
///
/// ```text
/// POST   /free            -> free
/// POST   /card            -> card
/// POST   /charge          -> charge
/// POST   /payment-link    -> payment_link
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/free", post(checkout::free))
        .route("/card", post(checkout::card))
        .route("/charge", post(checkout::charge))
        .route("/payment-link", post(checkout::payment_link))
}
