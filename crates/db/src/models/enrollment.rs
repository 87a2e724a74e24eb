//! Enrollment record model.

use campus_core::enrollment::EnrollmentState;
use campus_core::status::{EnrollmentStatus, StatusId};
use campus_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `enrollments` table.
///
/// Only `status_id` decides whether the student is enrolled; the row itself
/// outlives unenroll/re-enroll cycles.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Enrollment {
    pub id: DbId,
    pub user_id: DbId,
    pub course_id: DbId,
    pub status_id: StatusId,
    pub enrolled_by_group_id: Option<DbId>,
    pub payment_id: Option<String>,
    pub enrolled_at: Option<Timestamp>,
    pub progress_initialized_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Enrollment {
    pub fn is_enrolled(&self) -> bool {
        self.status_id == EnrollmentStatus::Enrolled.id()
    }

    /// The fields enrollment planning depends on.
    pub fn state(&self) -> EnrollmentState {
        EnrollmentState {
            enrolled: self.is_enrolled(),
            enrolled_by_group_id: self.enrolled_by_group_id,
        }
    }
}
