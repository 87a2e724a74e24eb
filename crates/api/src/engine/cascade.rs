//! Group cascade engine.
//!
//! Group membership and group-course links drive group-sourced
//! enrollments. Link changes are committed first; the ledger is then
//! brought up to date one member+course pair at a time, each in its own
//! transaction. A failing pair is logged and reported, and never stops
//! the others.

use std::collections::BTreeSet;

use campus_core::enrollment::{
    membership_diff, EnrollMode, EnrollmentSource, EnrollmentTransition,
};
use campus_core::error::CoreError;
use campus_core::types::DbId;
use campus_db::models::group::{GroupCourse, LinkCourse};
use campus_db::repositories::{CourseRepo, GroupRepo, UserRepo};
use serde::Serialize;

use super::ledger::{self, LedgerOutcome};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// What the ledger should do for one member+course pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CascadeStep {
    Enroll(DbId),
    Recompute,
}

/// A pair the cascade could not bring up to date.
#[derive(Debug, Clone, Serialize)]
pub struct CascadeFailure {
    pub user_id: DbId,
    pub course_id: DbId,
    pub error: String,
}

/// Per-pair results of a cascade.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CascadeReport {
    pub enrolled: usize,
    pub unenrolled: usize,
    pub reattributed: usize,
    pub unchanged: usize,
    pub failures: Vec<CascadeFailure>,
}

impl CascadeReport {
    fn record(&mut self, outcome: &LedgerOutcome) {
        match outcome.transition {
            EnrollmentTransition::Enrolled => self.enrolled += 1,
            EnrollmentTransition::Unenrolled => self.unenrolled += 1,
            EnrollmentTransition::SourceChanged => self.reattributed += 1,
            EnrollmentTransition::Unchanged => self.unchanged += 1,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LinkOutcome {
    pub link: GroupCourse,
    pub report: CascadeReport,
}

#[derive(Debug, Serialize)]
pub struct UnlinkOutcome {
    pub unlinked_course_ids: Vec<DbId>,
    pub report: CascadeReport,
}

#[derive(Debug, Serialize)]
pub struct MembershipOutcome {
    pub added_group_ids: Vec<DbId>,
    pub removed_group_ids: Vec<DbId>,
    pub report: CascadeReport,
}

/// Link a course to a group (or update the link's metadata) and enroll
/// every current member.
pub async fn link_course(
    state: &AppState,
    group_id: DbId,
    course_id: DbId,
    input: &LinkCourse,
    actor: DbId,
) -> AppResult<LinkOutcome> {
    ensure_group(state, group_id).await?;
    CourseRepo::find_by_id(&state.pool, course_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Course",
            id: course_id,
        }))?;

    let link = {
        let mut conn = state.pool.acquire().await?;
        GroupRepo::upsert_course_link(
            &mut *conn,
            group_id,
            course_id,
            input.is_mandatory,
            input.due_date,
            Some(actor),
        )
        .await?
    };

    let members = GroupRepo::member_ids(&state.pool, group_id).await?;
    let steps: Vec<_> = members
        .iter()
        .map(|&user_id| (user_id, course_id, CascadeStep::Enroll(group_id)))
        .collect();
    let report = run_steps(state, steps).await;

    tracing::info!(
        group_id,
        course_id,
        actor,
        members = members.len(),
        failures = report.failures.len(),
        "Course linked to group",
    );
    Ok(LinkOutcome { link, report })
}

/// Remove course links from a group and recompute every member for each
/// unlinked course.
///
/// Fails with [`CoreError::NotLinked`] when none of the courses is linked.
pub async fn unlink_courses(
    state: &AppState,
    group_id: DbId,
    course_ids: &[DbId],
    actor: DbId,
) -> AppResult<UnlinkOutcome> {
    ensure_group(state, group_id).await?;

    let unlinked = {
        let mut conn = state.pool.acquire().await?;
        GroupRepo::delete_course_links(&mut *conn, group_id, course_ids).await?
    };
    if unlinked.is_empty() {
        return Err(AppError::Core(CoreError::NotLinked { group_id }));
    }

    let members = GroupRepo::member_ids(&state.pool, group_id).await?;
    let steps: Vec<_> = members
        .iter()
        .flat_map(|&user_id| {
            unlinked
                .iter()
                .map(move |&course_id| (user_id, course_id, CascadeStep::Recompute))
        })
        .collect();
    let report = run_steps(state, steps).await;

    tracing::info!(
        group_id,
        actor,
        courses = ?unlinked,
        members = members.len(),
        failures = report.failures.len(),
        "Courses unlinked from group",
    );
    Ok(UnlinkOutcome {
        unlinked_course_ids: unlinked,
        report,
    })
}

/// Replace a user's group memberships wholesale.
///
/// Courses of removed groups are recomputed, then courses of added groups
/// are enrolled through the group. Groups kept by the call are untouched.
pub async fn set_user_groups(
    state: &AppState,
    user_id: DbId,
    group_ids: &[DbId],
    actor: DbId,
) -> AppResult<MembershipOutcome> {
    ensure_user(state, user_id).await?;

    let desired: Vec<DbId> = group_ids
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let found = GroupRepo::existing_ids(&state.pool, &desired).await?;
    if let Some(&missing) = desired.iter().find(|id| !found.contains(id)) {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Group",
            id: missing,
        }));
    }

    let mut tx = state.pool.begin().await?;
    let current = GroupRepo::group_ids_for_user(&mut *tx, user_id).await?;
    let diff = membership_diff(&current, &desired);

    let recompute_courses = GroupRepo::linked_course_ids(&mut *tx, &diff.removed).await?;
    let mut enroll_pairs: Vec<(DbId, DbId)> = Vec::new();
    for &group_id in &diff.added {
        for course_id in GroupRepo::linked_course_ids(&mut *tx, &[group_id]).await? {
            enroll_pairs.push((group_id, course_id));
        }
    }

    for &group_id in &diff.removed {
        GroupRepo::remove_member(&mut *tx, group_id, user_id).await?;
    }
    for &group_id in &diff.added {
        GroupRepo::add_member(&mut *tx, group_id, user_id, Some(actor)).await?;
    }
    tx.commit().await?;

    let steps: Vec<_> = recompute_courses
        .iter()
        .map(|&course_id| (user_id, course_id, CascadeStep::Recompute))
        .chain(
            enroll_pairs
                .iter()
                .map(|&(group_id, course_id)| (user_id, course_id, CascadeStep::Enroll(group_id))),
        )
        .collect();
    let report = run_steps(state, steps).await;

    tracing::info!(
        user_id,
        actor,
        added = ?diff.added,
        removed = ?diff.removed,
        failures = report.failures.len(),
        "User groups replaced",
    );
    Ok(MembershipOutcome {
        added_group_ids: diff.added,
        removed_group_ids: diff.removed,
        report,
    })
}

/// Add one user to a group and enroll them in every linked course.
pub async fn add_member(
    state: &AppState,
    group_id: DbId,
    user_id: DbId,
    actor: DbId,
) -> AppResult<MembershipOutcome> {
    ensure_group(state, group_id).await?;
    ensure_user(state, user_id).await?;

    let added = {
        let mut conn = state.pool.acquire().await?;
        GroupRepo::add_member(&mut *conn, group_id, user_id, Some(actor)).await?
    };

    let courses = GroupRepo::linked_course_ids(&state.pool, &[group_id]).await?;
    let steps: Vec<_> = courses
        .iter()
        .map(|&course_id| (user_id, course_id, CascadeStep::Enroll(group_id)))
        .collect();
    let report = run_steps(state, steps).await;

    tracing::info!(group_id, user_id, actor, added, "Group member added");
    Ok(MembershipOutcome {
        added_group_ids: if added { vec![group_id] } else { Vec::new() },
        removed_group_ids: Vec::new(),
        report,
    })
}

/// Remove one user from a group and recompute every linked course.
pub async fn remove_member(
    state: &AppState,
    group_id: DbId,
    user_id: DbId,
    actor: DbId,
) -> AppResult<MembershipOutcome> {
    ensure_group(state, group_id).await?;

    let removed = {
        let mut conn = state.pool.acquire().await?;
        GroupRepo::remove_member(&mut *conn, group_id, user_id).await?
    };
    if !removed {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "GroupMember",
            id: user_id,
        }));
    }

    let courses = GroupRepo::linked_course_ids(&state.pool, &[group_id]).await?;
    let steps: Vec<_> = courses
        .iter()
        .map(|&course_id| (user_id, course_id, CascadeStep::Recompute))
        .collect();
    let report = run_steps(state, steps).await;

    tracing::info!(group_id, user_id, actor, "Group member removed");
    Ok(MembershipOutcome {
        added_group_ids: Vec::new(),
        removed_group_ids: vec![group_id],
        report,
    })
}

// ---------------------------------------------------------------------------
// Per-pair application
// ---------------------------------------------------------------------------

async fn run_steps(state: &AppState, steps: Vec<(DbId, DbId, CascadeStep)>) -> CascadeReport {
    let mut report = CascadeReport::default();
    for (user_id, course_id, step) in steps {
        match apply_step(state, user_id, course_id, step).await {
            Ok(outcome) => report.record(&outcome),
            Err(e) => {
                tracing::warn!(
                    user_id,
                    course_id,
                    step = ?step,
                    error = %e,
                    "Cascade step failed, continuing with remaining members",
                );
                report.failures.push(CascadeFailure {
                    user_id,
                    course_id,
                    error: e.to_string(),
                });
            }
        }
    }
    report
}

async fn apply_step(
    state: &AppState,
    user_id: DbId,
    course_id: DbId,
    step: CascadeStep,
) -> AppResult<LedgerOutcome> {
    let mut tx = state.pool.begin().await?;
    let outcome = match step {
        CascadeStep::Enroll(group_id) => {
            if GroupRepo::lock_entitling_link(&mut *tx, group_id, user_id, course_id).await? {
                ledger::enroll(
                    &mut *tx,
                    user_id,
                    course_id,
                    EnrollmentSource::Group(group_id),
                    None,
                    EnrollMode::Idempotent,
                )
                .await?
            } else {
                // The member or the link went away after the step was planned.
                tracing::debug!(
                    group_id,
                    user_id,
                    course_id,
                    "Group no longer entitles member, recomputing",
                );
                ledger::recompute(&mut *tx, user_id, course_id).await?
            }
        }
        CascadeStep::Recompute => ledger::recompute(&mut *tx, user_id, course_id).await?,
    };
    tx.commit().await?;

    if let Some(event) = outcome.event() {
        state.event_bus.publish(event);
    }
    Ok(outcome)
}

async fn ensure_group(state: &AppState, group_id: DbId) -> AppResult<()> {
    GroupRepo::find_by_id(&state.pool, group_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Group",
            id: group_id,
        }))?;
    Ok(())
}

async fn ensure_user(state: &AppState, user_id: DbId) -> AppResult<()> {
    UserRepo::find_by_id(&state.pool, user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: user_id,
        }))?;
    Ok(())
}
