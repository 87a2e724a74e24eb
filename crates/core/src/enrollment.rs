//! Enrollment planning: the decision half of the enrollment ledger.
//!
//! A student is enrolled in a course iff they hold a direct enrollment or
//! belong to at least one group currently linked to the course. Every
//! ledger mutation is expressed here as a pure function from the current
//! record (plus, for recomputes, the entitling group links) to a plan. The
//! `api` engine loads the inputs under a row lock and applies the plan.
//!
//! Direct enrollment is represented by an `ENROLLED` record whose
//! `enrolled_by_group_id` is `NULL`. Direct entitlement therefore dominates
//! group entitlement: a recompute never converts a direct record into a
//! group-sourced one.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Where an enrollment request comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "group_id")]
pub enum EnrollmentSource {
    /// Individual enrollment: checkout, webhook confirmation, admin grant.
    Direct,
    /// Cascaded from membership in the given group.
    Group(DbId),
}

impl EnrollmentSource {
    /// The attributed group, `None` for direct enrollment.
    pub fn group_id(self) -> Option<DbId> {
        match self {
            Self::Direct => None,
            Self::Group(id) => Some(id),
        }
    }
}

/// Whether an enroll call tolerates an existing enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollMode {
    /// Already enrolled is a no-op (checkout, webhook, cascade).
    Idempotent,
    /// Already enrolled is a conflict (admin bulk enroll).
    RequireNew,
}

/// The parts of an existing enrollment row that planning depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollmentState {
    pub enrolled: bool,
    pub enrolled_by_group_id: Option<DbId>,
}

impl EnrollmentState {
    /// An `ENROLLED` record not attributable to any group.
    pub fn is_direct(&self) -> bool {
        self.enrolled && self.enrolled_by_group_id.is_none()
    }
}

/// A group-course link that entitles the student, as seen from one
/// student+course pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitlingLink {
    pub group_id: DbId,
    pub link_id: DbId,
    pub linked_at: Timestamp,
}

/// Pick the group a group-sourced enrollment is attributed to.
///
/// The earliest-created link wins (ties broken by link id), so repeated
/// recomputes over the same graph always attribute to the same group.
pub fn select_entitling_group(links: &[EntitlingLink]) -> Option<DbId> {
    links
        .iter()
        .min_by_key(|l| (l.linked_at, l.link_id))
        .map(|l| l.group_id)
}

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

/// Outcome of planning an `Enroll` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollPlan {
    /// The record already satisfies the request.
    Keep,
    /// A group-sourced enrollment becomes direct and survives later unlinks.
    UpgradeToDirect,
    /// Insert the record, or flip it into `ENROLLED`, with this source.
    Enroll(EnrollmentSource),
    /// `RequireNew` was asked for but the student is already enrolled.
    AlreadyEnrolled,
}

/// Plan an `Enroll(student, course, source)` call against the current record.
pub fn plan_enroll(
    existing: Option<&EnrollmentState>,
    source: EnrollmentSource,
    mode: EnrollMode,
) -> EnrollPlan {
    match existing {
        Some(state) if state.enrolled => {
            if mode == EnrollMode::RequireNew {
                EnrollPlan::AlreadyEnrolled
            } else if source == EnrollmentSource::Direct && !state.is_direct() {
                EnrollPlan::UpgradeToDirect
            } else {
                EnrollPlan::Keep
            }
        }
        _ => EnrollPlan::Enroll(source),
    }
}

/// Outcome of re-deriving one student+course pair from the group graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputePlan {
    /// Stored state already matches the derived state.
    Keep,
    /// Ensure `ENROLLED`, attributed to the given group.
    EnrollViaGroup(DbId),
    /// Set `NOT_ENROLLED` and clear the attribution.
    Unenroll,
}

/// Plan a `Recompute(student, course)` given the group that currently
/// entitles the student (see [`select_entitling_group`]).
pub fn plan_recompute(
    existing: Option<&EnrollmentState>,
    entitling_group: Option<DbId>,
) -> RecomputePlan {
    match (existing, entitling_group) {
        (Some(state), _) if state.is_direct() => RecomputePlan::Keep,
        (Some(state), Some(group_id))
            if state.enrolled && state.enrolled_by_group_id == Some(group_id) =>
        {
            RecomputePlan::Keep
        }
        (_, Some(group_id)) => RecomputePlan::EnrollViaGroup(group_id),
        (Some(state), None) if state.enrolled => RecomputePlan::Unenroll,
        (_, None) => RecomputePlan::Keep,
    }
}

/// Plan an administrative `Unenroll(student, course)`.
///
/// Removes the direct entitlement. A student who is still entitled through
/// a group stays enrolled, re-attributed to that group.
pub fn plan_unenroll(
    existing: Option<&EnrollmentState>,
    entitling_group: Option<DbId>,
) -> RecomputePlan {
    match (existing, entitling_group) {
        (None, _) => RecomputePlan::Keep,
        (Some(state), _) if !state.enrolled => RecomputePlan::Keep,
        (Some(state), Some(group_id)) if state.enrolled_by_group_id == Some(group_id) => {
            RecomputePlan::Keep
        }
        (Some(_), Some(group_id)) => RecomputePlan::EnrollViaGroup(group_id),
        (Some(_), None) => RecomputePlan::Unenroll,
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// What a ledger operation did to one record, reported back to callers
/// for event publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentTransition {
    /// Moved into `ENROLLED`.
    Enrolled,
    /// Moved into `NOT_ENROLLED`.
    Unenrolled,
    /// Stayed `ENROLLED` but its source changed.
    SourceChanged,
    /// Nothing was written.
    Unchanged,
}

/// Classify the change between two states of the same record.
pub fn classify_transition(
    before: Option<&EnrollmentState>,
    after: Option<&EnrollmentState>,
) -> EnrollmentTransition {
    let was = before.is_some_and(|s| s.enrolled);
    let is = after.is_some_and(|s| s.enrolled);
    match (was, is) {
        (false, true) => EnrollmentTransition::Enrolled,
        (true, false) => EnrollmentTransition::Unenrolled,
        (true, true)
            if before.map(|s| s.enrolled_by_group_id) != after.map(|s| s.enrolled_by_group_id) =>
        {
            EnrollmentTransition::SourceChanged
        }
        _ => EnrollmentTransition::Unchanged,
    }
}

// ---------------------------------------------------------------------------
// Group membership diff
// ---------------------------------------------------------------------------

/// Result of replacing a user's group memberships wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    pub added: Vec<DbId>,
    pub removed: Vec<DbId>,
}

/// Compute which groups a `SetUserGroups` call adds and removes.
///
/// Groups present in both sets are untouched, so they are never recomputed.
pub fn membership_diff(current: &[DbId], desired: &[DbId]) -> MembershipDiff {
    let current: BTreeSet<DbId> = current.iter().copied().collect();
    let desired: BTreeSet<DbId> = desired.iter().copied().collect();
    MembershipDiff {
        added: desired.difference(&current).copied().collect(),
        removed: current.difference(&desired).copied().collect(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use chrono::{Duration, TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn direct() -> EnrollmentState {
        EnrollmentState {
            enrolled: true,
            enrolled_by_group_id: None,
        }
    }

    fn via(group_id: DbId) -> EnrollmentState {
        EnrollmentState {
            enrolled: true,
            enrolled_by_group_id: Some(group_id),
        }
    }

    fn not_enrolled() -> EnrollmentState {
        EnrollmentState {
            enrolled: false,
            enrolled_by_group_id: None,
        }
    }

    fn link(group_id: DbId, link_id: DbId, minutes: i64) -> EntitlingLink {
        EntitlingLink {
            group_id,
            link_id,
            linked_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minutes),
        }
    }

    // -- plan_enroll --

    #[test]
    fn enroll_without_record_inserts() {
        assert_eq!(
            plan_enroll(None, EnrollmentSource::Group(4), EnrollMode::Idempotent),
            EnrollPlan::Enroll(EnrollmentSource::Group(4))
        );
    }

    #[test]
    fn enroll_flips_not_enrolled_record() {
        assert_eq!(
            plan_enroll(Some(&not_enrolled()), EnrollmentSource::Direct, EnrollMode::Idempotent),
            EnrollPlan::Enroll(EnrollmentSource::Direct)
        );
    }

    #[test]
    fn enroll_is_noop_when_already_enrolled() {
        assert_eq!(
            plan_enroll(Some(&direct()), EnrollmentSource::Direct, EnrollMode::Idempotent),
            EnrollPlan::Keep
        );
        assert_eq!(
            plan_enroll(Some(&via(2)), EnrollmentSource::Group(3), EnrollMode::Idempotent),
            EnrollPlan::Keep
        );
        assert_eq!(
            plan_enroll(Some(&direct()), EnrollmentSource::Group(3), EnrollMode::Idempotent),
            EnrollPlan::Keep
        );
    }

    #[test]
    fn direct_enroll_upgrades_group_sourced_record() {
        assert_eq!(
            plan_enroll(Some(&via(2)), EnrollmentSource::Direct, EnrollMode::Idempotent),
            EnrollPlan::UpgradeToDirect
        );
    }

    #[test]
    fn require_new_rejects_existing_enrollment() {
        assert_eq!(
            plan_enroll(Some(&via(2)), EnrollmentSource::Direct, EnrollMode::RequireNew),
            EnrollPlan::AlreadyEnrolled
        );
        assert_eq!(
            plan_enroll(Some(&not_enrolled()), EnrollmentSource::Direct, EnrollMode::RequireNew),
            EnrollPlan::Enroll(EnrollmentSource::Direct)
        );
    }

    // -- plan_recompute --

    #[test]
    fn recompute_never_touches_direct_enrollment() {
        assert_eq!(plan_recompute(Some(&direct()), None), RecomputePlan::Keep);
        assert_eq!(plan_recompute(Some(&direct()), Some(5)), RecomputePlan::Keep);
    }

    #[test]
    fn recompute_unenrolls_when_no_group_entitles() {
        assert_eq!(plan_recompute(Some(&via(5)), None), RecomputePlan::Unenroll);
    }

    #[test]
    fn recompute_reattributes_to_remaining_group() {
        assert_eq!(
            plan_recompute(Some(&via(1)), Some(2)),
            RecomputePlan::EnrollViaGroup(2)
        );
        assert_eq!(plan_recompute(Some(&via(2)), Some(2)), RecomputePlan::Keep);
    }

    #[test]
    fn recompute_without_record_or_entitlement_is_noop() {
        assert_eq!(plan_recompute(None, None), RecomputePlan::Keep);
        assert_eq!(plan_recompute(Some(&not_enrolled()), None), RecomputePlan::Keep);
    }

    #[test]
    fn recompute_enrolls_newly_entitled_student() {
        assert_eq!(plan_recompute(None, Some(9)), RecomputePlan::EnrollViaGroup(9));
        assert_eq!(
            plan_recompute(Some(&not_enrolled()), Some(9)),
            RecomputePlan::EnrollViaGroup(9)
        );
    }

    // -- plan_unenroll --

    #[test]
    fn unenroll_keeps_group_entitled_student_enrolled() {
        assert_eq!(plan_unenroll(Some(&direct()), Some(3)), RecomputePlan::EnrollViaGroup(3));
        assert_eq!(plan_unenroll(Some(&via(3)), Some(3)), RecomputePlan::Keep);
    }

    #[test]
    fn unenroll_without_entitlement_clears_record() {
        assert_eq!(plan_unenroll(Some(&direct()), None), RecomputePlan::Unenroll);
        assert_eq!(plan_unenroll(Some(&not_enrolled()), None), RecomputePlan::Keep);
        assert_eq!(plan_unenroll(None, None), RecomputePlan::Keep);
    }

    // -- select_entitling_group --

    #[test]
    fn earliest_link_wins_regardless_of_input_order() {
        let links = [link(7, 30, 10), link(3, 12, 5), link(9, 2, 20)];
        assert_eq!(select_entitling_group(&links), Some(3));
    }

    #[test]
    fn link_id_breaks_timestamp_ties() {
        let links = [link(7, 30, 5), link(3, 31, 5)];
        assert_eq!(select_entitling_group(&links), Some(7));
        assert_eq!(select_entitling_group(&[]), None);
    }

    // -- classify_transition --

    #[test]
    fn transitions_are_classified() {
        assert_eq!(
            classify_transition(None, Some(&via(1))),
            EnrollmentTransition::Enrolled
        );
        assert_eq!(
            classify_transition(Some(&via(1)), Some(&not_enrolled())),
            EnrollmentTransition::Unenrolled
        );
        assert_eq!(
            classify_transition(Some(&via(1)), Some(&direct())),
            EnrollmentTransition::SourceChanged
        );
        assert_eq!(
            classify_transition(Some(&direct()), Some(&direct())),
            EnrollmentTransition::Unchanged
        );
    }

    // -- membership_diff --

    #[test]
    fn membership_diff_ignores_unchanged_groups() {
        let diff = membership_diff(&[1, 2, 3], &[3, 4, 4]);
        assert_eq!(diff.added, vec![4]);
        assert_eq!(diff.removed, vec![1, 2]);
    }

    // -- Randomized invariant check --

    /// In-memory model of the ledger that drives the planners exactly the
    /// way the engine does, while tracking direct entitlement separately as
    /// ground truth.
    #[derive(Default)]
    struct Model {
        members: HashSet<(DbId, DbId)>,
        links: HashMap<(DbId, DbId), EntitlingLink>,
        direct: HashSet<(DbId, DbId)>,
        records: HashMap<(DbId, DbId), EnrollmentState>,
        next_link_id: DbId,
    }

    impl Model {
        fn entitling_group(&self, user: DbId, course: DbId) -> Option<DbId> {
            let links: Vec<EntitlingLink> = self
                .links
                .iter()
                .filter(|((g, c), _)| *c == course && self.members.contains(&(*g, user)))
                .map(|(_, l)| *l)
                .collect();
            select_entitling_group(&links)
        }

        fn apply_recompute(&mut self, key: (DbId, DbId), plan: RecomputePlan) {
            match plan {
                RecomputePlan::Keep => {}
                RecomputePlan::EnrollViaGroup(g) => {
                    self.records.insert(key, via(g));
                }
                RecomputePlan::Unenroll => {
                    self.records.insert(key, not_enrolled());
                }
            }
        }

        fn enroll(&mut self, user: DbId, course: DbId, source: EnrollmentSource) {
            let key = (user, course);
            match plan_enroll(self.records.get(&key), source, EnrollMode::Idempotent) {
                EnrollPlan::Keep | EnrollPlan::AlreadyEnrolled => {}
                EnrollPlan::UpgradeToDirect => {
                    self.records.insert(key, direct());
                }
                EnrollPlan::Enroll(src) => {
                    self.records.insert(
                        key,
                        EnrollmentState {
                            enrolled: true,
                            enrolled_by_group_id: src.group_id(),
                        },
                    );
                }
            }
        }

        fn recompute(&mut self, user: DbId, course: DbId) {
            let plan = plan_recompute(
                self.records.get(&(user, course)),
                self.entitling_group(user, course),
            );
            self.apply_recompute((user, course), plan);
        }

        fn group_members(&self, group: DbId) -> Vec<DbId> {
            self.members
                .iter()
                .filter(|(g, _)| *g == group)
                .map(|(_, u)| *u)
                .collect()
        }

        fn group_courses(&self, group: DbId) -> Vec<DbId> {
            self.links
                .keys()
                .filter(|(g, _)| *g == group)
                .map(|(_, c)| *c)
                .collect()
        }

        fn link_course(&mut self, group: DbId, course: DbId, minute: i64) {
            if !self.links.contains_key(&(group, course)) {
                self.next_link_id += 1;
                self.links
                    .insert((group, course), link(group, self.next_link_id, minute));
            }
            for user in self.group_members(group) {
                self.enroll(user, course, EnrollmentSource::Group(group));
            }
        }

        fn unlink_course(&mut self, group: DbId, course: DbId) {
            if self.links.remove(&(group, course)).is_none() {
                return;
            }
            for user in self.group_members(group) {
                self.recompute(user, course);
            }
        }

        fn add_member(&mut self, group: DbId, user: DbId) {
            self.members.insert((group, user));
            for course in self.group_courses(group) {
                self.enroll(user, course, EnrollmentSource::Group(group));
            }
        }

        fn remove_member(&mut self, group: DbId, user: DbId) {
            if !self.members.remove(&(group, user)) {
                return;
            }
            for course in self.group_courses(group) {
                self.recompute(user, course);
            }
        }

        fn direct_enroll(&mut self, user: DbId, course: DbId) {
            self.direct.insert((user, course));
            self.enroll(user, course, EnrollmentSource::Direct);
        }

        fn unenroll(&mut self, user: DbId, course: DbId) {
            self.direct.remove(&(user, course));
            let plan = plan_unenroll(
                self.records.get(&(user, course)),
                self.entitling_group(user, course),
            );
            self.apply_recompute((user, course), plan);
        }

        fn assert_invariant(&self, users: DbId, courses: DbId, step: usize) {
            for user in 1..=users {
                for course in 1..=courses {
                    let entitled = self.direct.contains(&(user, course))
                        || self.entitling_group(user, course).is_some();
                    let record = self.records.get(&(user, course));
                    let enrolled = record.is_some_and(|r| r.enrolled);
                    assert_eq!(
                        enrolled, entitled,
                        "step {step}: user {user} course {course} enrolled={enrolled} entitled={entitled}"
                    );
                    if let Some(group) = record.and_then(|r| r.enrolled_by_group_id) {
                        assert!(
                            self.members.contains(&(group, user))
                                && self.links.contains_key(&(group, course)),
                            "step {step}: enrollment attributed to non-entitling group {group}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn enrolled_iff_direct_or_linked_group_over_random_sequences() {
        const USERS: DbId = 4;
        const COURSES: DbId = 3;
        const GROUPS: DbId = 3;

        for seed in 0..200u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut model = Model::default();

            for step in 0..60 {
                let user = rng.random_range(1..=USERS);
                let course = rng.random_range(1..=COURSES);
                let group = rng.random_range(1..=GROUPS);
                match rng.random_range(0..6) {
                    0 => model.link_course(group, course, step as i64),
                    1 => model.unlink_course(group, course),
                    2 => model.add_member(group, user),
                    3 => model.remove_member(group, user),
                    4 => model.direct_enroll(user, course),
                    _ => model.unenroll(user, course),
                }
                model.assert_invariant(USERS, COURSES, step);
            }
        }
    }

    #[test]
    fn multi_group_retention_scenario() {
        let mut model = Model::default();
        model.add_member(1, 10);
        model.add_member(2, 10);
        model.link_course(1, 100, 0);
        model.link_course(2, 100, 1);
        assert_eq!(model.records[&(10, 100)], via(1));

        model.unlink_course(1, 100);
        assert_eq!(model.records[&(10, 100)], via(2));

        model.unlink_course(2, 100);
        assert!(!model.records[&(10, 100)].enrolled);
        assert_eq!(model.records[&(10, 100)].enrolled_by_group_id, None);
    }
}
