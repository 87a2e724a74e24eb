//! Handlers for the `/orders` resource.

use axum::extract::{Path, State};
use axum::Json;
use campus_core::types::DbId;
use campus_db::models::order::{Order, OrderWithItems};

use crate::engine::orders;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/orders
pub async fn list(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Order>>>> {
    let orders = orders::list_orders(&state.pool, user.user_id).await?;
    Ok(Json(DataResponse { data: orders }))
}

/// GET /api/v1/orders/{id}
pub async fn get_by_id(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<OrderWithItems>>> {
    let order = orders::get_order(&state.pool, &user, id).await?;
    Ok(Json(DataResponse { data: order }))
}
