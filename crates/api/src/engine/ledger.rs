//! Enrollment ledger.
//!
//! The planners in `campus_core::enrollment` decide what a call should do;
//! this module loads their inputs under a row lock and applies the plan.
//! Progress rows are created in the same transaction, exactly once per
//! record.

use std::collections::BTreeSet;

use campus_core::enrollment::{
    classify_transition, plan_enroll, plan_recompute, plan_unenroll, select_entitling_group,
    EnrollMode, EnrollPlan, EnrollmentSource, EnrollmentState, EnrollmentTransition,
    EntitlingLink, RecomputePlan,
};
use campus_core::error::CoreError;
use campus_core::types::DbId;
use campus_db::models::enrollment::Enrollment;
use campus_db::repositories::{
    CourseRepo, EnrollmentRepo, GroupRepo, ProgressInit, ProgressRepo, UserRepo,
};
use campus_events::PlatformEvent;
use sqlx::PgConnection;

use super::PendingEvents;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// What a ledger call did to one student+course record.
#[derive(Debug, Clone)]
pub struct LedgerOutcome {
    /// The record after the call; `None` when no record exists.
    pub enrollment: Option<Enrollment>,
    pub transition: EnrollmentTransition,
    /// Progress rows created, when this call performed the one-time
    /// initialization.
    pub progress: Option<ProgressInit>,
}

impl LedgerOutcome {
    fn unchanged(enrollment: Option<Enrollment>) -> Self {
        Self {
            enrollment,
            transition: EnrollmentTransition::Unchanged,
            progress: None,
        }
    }

    fn applied(
        before: Option<EnrollmentState>,
        after: Enrollment,
        progress: Option<ProgressInit>,
    ) -> Self {
        let transition = classify_transition(before.as_ref(), Some(&after.state()));
        Self {
            enrollment: Some(after),
            transition,
            progress,
        }
    }

    /// The domain event for this change, if the enrolled status flipped.
    pub fn event(&self) -> Option<PlatformEvent> {
        let e = self.enrollment.as_ref()?;
        match self.transition {
            EnrollmentTransition::Enrolled => Some(PlatformEvent::enrollment_created(
                e.id,
                e.user_id,
                e.course_id,
                e.enrolled_by_group_id,
            )),
            EnrollmentTransition::Unenrolled => Some(PlatformEvent::enrollment_removed(
                e.id,
                e.user_id,
                e.course_id,
            )),
            EnrollmentTransition::SourceChanged | EnrollmentTransition::Unchanged => None,
        }
    }
}

/// Ensure the student is enrolled in the course from `source`.
///
/// An existing enrollment is kept as is, except that a direct call upgrades
/// a group-sourced record to direct. With [`EnrollMode::RequireNew`] an
/// existing enrollment is a conflict instead.
pub async fn enroll(
    conn: &mut PgConnection,
    user_id: DbId,
    course_id: DbId,
    source: EnrollmentSource,
    payment_id: Option<&str>,
    mode: EnrollMode,
) -> AppResult<LedgerOutcome> {
    let existing = lock_pair(&mut *conn, user_id, course_id).await?;
    let before = existing.as_ref().map(Enrollment::state);

    match plan_enroll(before.as_ref(), source, mode) {
        EnrollPlan::Keep => Ok(LedgerOutcome::unchanged(existing)),
        EnrollPlan::AlreadyEnrolled => Err(AppError::Core(CoreError::StudentsAlreadyEnrolled {
            user_ids: vec![user_id],
        })),
        EnrollPlan::UpgradeToDirect => {
            let row =
                EnrollmentRepo::upsert_enrolled(&mut *conn, user_id, course_id, None, payment_id)
                    .await?;
            tracing::debug!(user_id, course_id, "Group enrollment upgraded to direct");
            Ok(LedgerOutcome::applied(before, row, None))
        }
        EnrollPlan::Enroll(source) => {
            let row = EnrollmentRepo::upsert_enrolled(
                &mut *conn,
                user_id,
                course_id,
                source.group_id(),
                payment_id,
            )
            .await?;
            let (row, progress) = initialize_progress(&mut *conn, row).await?;
            tracing::info!(
                user_id,
                course_id,
                group_id = ?source.group_id(),
                "Student enrolled",
            );
            Ok(LedgerOutcome::applied(before, row, progress))
        }
    }
}

/// Re-derive the pair's status from the current group graph.
///
/// Direct enrollments are never touched. Otherwise the student is enrolled
/// iff some group they belong to links the course, attributed to the
/// earliest such link.
pub async fn recompute(
    conn: &mut PgConnection,
    user_id: DbId,
    course_id: DbId,
) -> AppResult<LedgerOutcome> {
    let mut existing = EnrollmentRepo::find_for_update(&mut *conn, user_id, course_id).await?;
    let group_id = entitling_group(&mut *conn, user_id, course_id).await?;
    if existing.is_none() && group_id.is_some() {
        existing = lock_pair(&mut *conn, user_id, course_id).await?;
    }
    let before = existing.as_ref().map(Enrollment::state);

    match plan_recompute(before.as_ref(), group_id) {
        RecomputePlan::Keep => Ok(LedgerOutcome::unchanged(existing)),
        RecomputePlan::EnrollViaGroup(group_id) => {
            let row = match existing {
                Some(record) if record.is_enrolled() => {
                    EnrollmentRepo::set_source(&mut *conn, record.id, Some(group_id)).await?
                }
                _ => {
                    let row = EnrollmentRepo::upsert_enrolled(
                        &mut *conn,
                        user_id,
                        course_id,
                        Some(group_id),
                        None,
                    )
                    .await?;
                    let (row, progress) = initialize_progress(&mut *conn, row).await?;
                    return Ok(LedgerOutcome::applied(before, row, progress));
                }
            };
            tracing::debug!(user_id, course_id, group_id, "Enrollment re-attributed");
            Ok(LedgerOutcome::applied(before, row, None))
        }
        RecomputePlan::Unenroll => match existing {
            Some(record) => {
                let row = EnrollmentRepo::mark_not_enrolled(&mut *conn, record.id).await?;
                tracing::info!(user_id, course_id, "Student no longer entitled, unenrolled");
                Ok(LedgerOutcome::applied(before, row, None))
            }
            None => Ok(LedgerOutcome::unchanged(None)),
        },
    }
}

/// Remove the student's direct entitlement to the course.
///
/// A student still entitled through a group stays enrolled, attributed to
/// that group.
pub async fn unenroll(
    conn: &mut PgConnection,
    user_id: DbId,
    course_id: DbId,
) -> AppResult<LedgerOutcome> {
    let existing = EnrollmentRepo::find_for_update(&mut *conn, user_id, course_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Enrollment",
            id: course_id,
        }))?;
    let before = existing.state();
    let group_id = entitling_group(&mut *conn, user_id, course_id).await?;

    match plan_unenroll(Some(&before), group_id) {
        RecomputePlan::Keep => Ok(LedgerOutcome::unchanged(Some(existing))),
        RecomputePlan::EnrollViaGroup(group_id) => {
            let row = EnrollmentRepo::set_source(&mut *conn, existing.id, Some(group_id)).await?;
            tracing::info!(
                user_id,
                course_id,
                group_id,
                "Direct enrollment removed, group enrollment remains",
            );
            Ok(LedgerOutcome::applied(Some(before), row, None))
        }
        RecomputePlan::Unenroll => {
            let row = EnrollmentRepo::mark_not_enrolled(&mut *conn, existing.id).await?;
            tracing::info!(user_id, course_id, "Student unenrolled");
            Ok(LedgerOutcome::applied(Some(before), row, None))
        }
    }
}

/// Row-lock the pair's record. With no record yet, a `not_enrolled`
/// placeholder is reserved first, so concurrent first enrollments of the
/// same pair queue on one row and the later one sees the earlier's result.
///
/// Returns `None` when this call created the placeholder.
async fn lock_pair(
    conn: &mut PgConnection,
    user_id: DbId,
    course_id: DbId,
) -> Result<Option<Enrollment>, sqlx::Error> {
    if let Some(row) = EnrollmentRepo::find_for_update(&mut *conn, user_id, course_id).await? {
        return Ok(Some(row));
    }
    if EnrollmentRepo::reserve(&mut *conn, user_id, course_id).await? {
        return Ok(None);
    }
    EnrollmentRepo::find_for_update(&mut *conn, user_id, course_id).await
}

async fn entitling_group(
    conn: &mut PgConnection,
    user_id: DbId,
    course_id: DbId,
) -> Result<Option<DbId>, sqlx::Error> {
    let links: Vec<EntitlingLink> = GroupRepo::entitling_links(conn, user_id, course_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(select_entitling_group(&links))
}

/// Create the progress rows for a freshly enrolled record, once.
async fn initialize_progress(
    conn: &mut PgConnection,
    enrollment: Enrollment,
) -> Result<(Enrollment, Option<ProgressInit>), sqlx::Error> {
    if !EnrollmentRepo::claim_progress_initialization(&mut *conn, enrollment.id).await? {
        return Ok((enrollment, None));
    }
    let init =
        ProgressRepo::initialize(&mut *conn, enrollment.user_id, enrollment.course_id).await?;
    tracing::debug!(
        user_id = enrollment.user_id,
        course_id = enrollment.course_id,
        chapters = init.chapters,
        lessons = init.lessons,
        "Progress initialized",
    );
    let refreshed = EnrollmentRepo::find(&mut *conn, enrollment.user_id, enrollment.course_id)
        .await?
        .unwrap_or(enrollment);
    Ok((refreshed, Some(init)))
}

// ---------------------------------------------------------------------------
// Administrative operations
// ---------------------------------------------------------------------------

/// Enroll every listed student directly, all or nothing.
///
/// Fails with [`CoreError::StudentsAlreadyEnrolled`] naming every student
/// who already holds an enrollment; nobody is enrolled in that case.
pub async fn bulk_enroll(
    state: &AppState,
    course_id: DbId,
    user_ids: &[DbId],
    actor: DbId,
) -> AppResult<Vec<Enrollment>> {
    let user_ids: Vec<DbId> = user_ids
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if user_ids.is_empty() {
        return Err(AppError::BadRequest("user_ids must not be empty".into()));
    }
    ensure_course(state, course_id).await?;

    let found = UserRepo::existing_ids(&state.pool, &user_ids).await?;
    if let Some(&missing) = user_ids.iter().find(|id| !found.contains(id)) {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: missing,
        }));
    }

    let mut events = PendingEvents::new();
    let mut tx = state.pool.begin().await?;

    let conflicts = EnrollmentRepo::enrolled_user_ids(&mut *tx, course_id, &user_ids).await?;
    if !conflicts.is_empty() {
        return Err(AppError::Core(CoreError::StudentsAlreadyEnrolled {
            user_ids: conflicts,
        }));
    }

    let mut enrolled = Vec::with_capacity(user_ids.len());
    for &user_id in &user_ids {
        let outcome = enroll(
            &mut *tx,
            user_id,
            course_id,
            EnrollmentSource::Direct,
            None,
            EnrollMode::RequireNew,
        )
        .await?;
        events.record(&outcome);
        enrolled.extend(outcome.enrollment);
    }

    tx.commit().await?;
    events.publish(&state.event_bus);

    tracing::info!(course_id, actor, count = enrolled.len(), "Bulk enrollment completed");
    Ok(enrolled)
}

/// Administrative removal of one student's direct enrollment.
pub async fn unenroll_student(
    state: &AppState,
    user_id: DbId,
    course_id: DbId,
    actor: DbId,
) -> AppResult<Enrollment> {
    let mut tx = state.pool.begin().await?;
    let outcome = unenroll(&mut *tx, user_id, course_id).await?;
    tx.commit().await?;

    if let Some(event) = outcome.event() {
        state.event_bus.publish(event.with_actor(actor));
    }

    outcome.enrollment.ok_or(AppError::Core(CoreError::NotFound {
        entity: "Enrollment",
        id: course_id,
    }))
}

async fn ensure_course(state: &AppState, course_id: DbId) -> AppResult<()> {
    CourseRepo::find_by_id(&state.pool, course_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Course",
            id: course_id,
        }))?;
    Ok(())
}
