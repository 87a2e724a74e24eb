//! Handlers for the `/checkout` paths.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::engine::checkout::{self, ChargeInput, CheckoutOutcome, PaymentLinkInput};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

type CheckoutResponse = AppResult<(StatusCode, Json<DataResponse<CheckoutOutcome>>)>;

fn created(outcome: CheckoutOutcome) -> CheckoutResponse {
    Ok((StatusCode::CREATED, Json(DataResponse { data: outcome })))
}

/// POST /api/v1/checkout/free
pub async fn free(user: AuthUser, State(state): State<AppState>) -> CheckoutResponse {
    created(checkout::free_checkout(&state, user.user_id).await?)
}

/// POST /api/v1/checkout/card
pub async fn card(user: AuthUser, State(state): State<AppState>) -> CheckoutResponse {
    created(checkout::card_checkout(&state, user.user_id).await?)
}

/// POST /api/v1/checkout/charge
pub async fn charge(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<ChargeInput>,
) -> CheckoutResponse {
    created(checkout::direct_charge_checkout(&state, user.user_id, &input).await?)
}

/// POST /api/v1/checkout/payment-link
pub async fn payment_link(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<PaymentLinkInput>,
) -> CheckoutResponse {
    created(checkout::payment_link_checkout(&state, user.user_id, &input).await?)
}
