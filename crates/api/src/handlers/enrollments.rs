//! Handlers for the student's own `/enrollments`.

use axum::extract::{Path, State};
use axum::Json;
use campus_core::error::CoreError;
use campus_core::types::DbId;
use campus_db::models::enrollment::Enrollment;
use campus_db::repositories::EnrollmentRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/enrollments
///
/// Courses the student is currently enrolled in.
pub async fn list(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Enrollment>>>> {
    let enrollments = EnrollmentRepo::list_enrolled(&state.pool, user.user_id).await?;
    Ok(Json(DataResponse { data: enrollments }))
}

/// GET /api/v1/enrollments/{course_id}
pub async fn get_by_course(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Enrollment>>> {
    let enrollment = EnrollmentRepo::find(&state.pool, user.user_id, course_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Enrollment",
            id: course_id,
        }))?;
    Ok(Json(DataResponse { data: enrollment }))
}
