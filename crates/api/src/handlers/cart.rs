//! Handlers for the `/cart` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use campus_core::checkout::CheckoutItem;
use campus_core::types::DbId;
use campus_db::models::cart::CartItem;
use serde::Deserialize;

use crate::engine::orders;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddCartItem {
    pub course_id: DbId,
}

/// GET /api/v1/cart
///
/// Cart items with the courses' current prices.
pub async fn list(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<CheckoutItem>>>> {
    let items = orders::get_checkout_items(&state.pool, user.user_id).await?;
    Ok(Json(DataResponse { data: items }))
}

/// POST /api/v1/cart/items
pub async fn add(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<AddCartItem>,
) -> AppResult<(StatusCode, Json<DataResponse<CartItem>>)> {
    let item = orders::add_to_cart(&state.pool, user.user_id, input.course_id).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: item })))
}

/// DELETE /api/v1/cart/items/{course_id}
pub async fn remove(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<DbId>,
) -> AppResult<StatusCode> {
    orders::remove_from_cart(&state.pool, user.user_id, course_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
