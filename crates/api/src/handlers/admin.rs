//! Admin handlers: explicit enrollment and group management.
//!
//! All handlers require the `admin` role via [`RequireAdmin`].

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use campus_core::types::DbId;
use campus_db::models::enrollment::Enrollment;
use campus_db::models::group::LinkCourse;
use serde::Deserialize;

use crate::engine::cascade::{self, LinkOutcome, MembershipOutcome, UnlinkOutcome};
use crate::engine::ledger;
use crate::error::AppResult;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BulkEnrollRequest {
    pub user_ids: Vec<DbId>,
}

#[derive(Debug, Deserialize)]
pub struct UnlinkRequest {
    pub course_ids: Vec<DbId>,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: DbId,
}

#[derive(Debug, Deserialize)]
pub struct SetGroupsRequest {
    pub group_ids: Vec<DbId>,
}

// ---------------------------------------------------------------------------
// Course enrollments
// ---------------------------------------------------------------------------

/// POST /api/v1/admin/courses/{id}/enrollments
pub async fn bulk_enroll(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(course_id): Path<DbId>,
    Json(input): Json<BulkEnrollRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Vec<Enrollment>>>)> {
    let enrolled = ledger::bulk_enroll(&state, course_id, &input.user_ids, admin.user_id).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: enrolled })))
}

/// DELETE /api/v1/admin/courses/{id}/enrollments/{user_id}
pub async fn unenroll(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path((course_id, user_id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<Enrollment>>> {
    let enrollment = ledger::unenroll_student(&state, user_id, course_id, admin.user_id).await?;
    Ok(Json(DataResponse { data: enrollment }))
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

/// PUT /api/v1/admin/groups/{id}/courses/{course_id}
pub async fn link_course(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path((group_id, course_id)): Path<(DbId, DbId)>,
    Json(input): Json<LinkCourse>,
) -> AppResult<Json<DataResponse<LinkOutcome>>> {
    let outcome =
        cascade::link_course(&state, group_id, course_id, &input, admin.user_id).await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// DELETE /api/v1/admin/groups/{id}/courses
pub async fn unlink_courses(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(group_id): Path<DbId>,
    Json(input): Json<UnlinkRequest>,
) -> AppResult<Json<DataResponse<UnlinkOutcome>>> {
    let outcome =
        cascade::unlink_courses(&state, group_id, &input.course_ids, admin.user_id).await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// POST /api/v1/admin/groups/{id}/members
pub async fn add_member(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(group_id): Path<DbId>,
    Json(input): Json<AddMemberRequest>,
) -> AppResult<Json<DataResponse<MembershipOutcome>>> {
    let outcome = cascade::add_member(&state, group_id, input.user_id, admin.user_id).await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// DELETE /api/v1/admin/groups/{id}/members/{user_id}
pub async fn remove_member(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path((group_id, user_id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<MembershipOutcome>>> {
    let outcome = cascade::remove_member(&state, group_id, user_id, admin.user_id).await?;
    Ok(Json(DataResponse { data: outcome }))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// PUT /api/v1/admin/users/{id}/groups
pub async fn set_user_groups(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(user_id): Path<DbId>,
    Json(input): Json<SetGroupsRequest>,
) -> AppResult<Json<DataResponse<MembershipOutcome>>> {
    let outcome =
        cascade::set_user_groups(&state, user_id, &input.group_ids, admin.user_id).await?;
    Ok(Json(DataResponse { data: outcome }))
}
