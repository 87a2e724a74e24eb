//! Enrollment ledger: direct enrollment, upgrades, unenrollment and the
//! admin bulk path.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use axum::http::StatusCode;
use campus_api::engine::ledger;
use campus_api::error::AppError;
use campus_core::enrollment::{EnrollMode, EnrollmentSource, EnrollmentTransition};
use campus_core::error::CoreError;
use campus_core::roles::{ROLE_ADMIN, ROLE_STUDENT};
use campus_db::repositories::{EnrollmentRepo, GroupRepo, ProgressRepo};
use campus_payments::ProviderRegistry;
use common::{body_json, delete_auth, get_auth, post_json_auth};
use sqlx::PgPool;

#[sqlx::test(migrations = "../../db/migrations")]
async fn first_enrollment_initializes_progress_once(pool: PgPool) {
    let student = common::seed_student(&pool, "s@campus.test").await;
    let course = common::seed_course(&pool, "Rust", 0, None).await;

    let mut tx = pool.begin().await.unwrap();
    let first = ledger::enroll(
        &mut *tx,
        student,
        course,
        EnrollmentSource::Direct,
        None,
        EnrollMode::Idempotent,
    )
    .await
    .unwrap();
    let second = ledger::enroll(
        &mut *tx,
        student,
        course,
        EnrollmentSource::Direct,
        None,
        EnrollMode::Idempotent,
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(first.transition, EnrollmentTransition::Enrolled);
    let progress = first.progress.expect("progress initialized");
    assert_eq!((progress.chapters, progress.lessons), (1, 2));
    assert!(first.event().is_some());

    assert_eq!(second.transition, EnrollmentTransition::Unchanged);
    assert!(second.progress.is_none());
    assert!(second.event().is_none());

    let counts = ProgressRepo::count_for_course(&pool, student, course).await.unwrap();
    assert_eq!(counts, (1, 2));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn direct_call_upgrades_group_enrollment(pool: PgPool) {
    let student = common::seed_student(&pool, "s@campus.test").await;
    let course = common::seed_course(&pool, "Rust", 0, None).await;
    let group = common::seed_group(&pool, "Cohort").await;

    let mut tx = pool.begin().await.unwrap();
    GroupRepo::add_member(&mut *tx, group, student, None).await.unwrap();
    GroupRepo::upsert_course_link(&mut *tx, group, course, false, None, None)
        .await
        .unwrap();
    ledger::enroll(
        &mut *tx,
        student,
        course,
        EnrollmentSource::Group(group),
        None,
        EnrollMode::Idempotent,
    )
    .await
    .unwrap();
    let upgraded = ledger::enroll(
        &mut *tx,
        student,
        course,
        EnrollmentSource::Direct,
        Some("pay_1"),
        EnrollMode::Idempotent,
    )
    .await
    .unwrap();

    assert_eq!(upgraded.transition, EnrollmentTransition::SourceChanged);
    let record = upgraded.enrollment.unwrap();
    assert_eq!(record.enrolled_by_group_id, None);
    assert_eq!(record.payment_id.as_deref(), Some("pay_1"));

    // Losing the group no longer matters for a direct enrollment.
    GroupRepo::delete_course_links(&mut *tx, group, &[course]).await.unwrap();
    let after = ledger::recompute(&mut *tx, student, course).await.unwrap();
    assert_eq!(after.transition, EnrollmentTransition::Unchanged);
    assert!(after.enrollment.unwrap().is_enrolled());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unenroll_keeps_student_entitled_through_group(pool: PgPool) {
    let student = common::seed_student(&pool, "s@campus.test").await;
    let course = common::seed_course(&pool, "Rust", 0, None).await;
    let group = common::seed_group(&pool, "Cohort").await;

    let mut tx = pool.begin().await.unwrap();
    ledger::enroll(
        &mut *tx,
        student,
        course,
        EnrollmentSource::Direct,
        None,
        EnrollMode::Idempotent,
    )
    .await
    .unwrap();
    GroupRepo::add_member(&mut *tx, group, student, None).await.unwrap();
    GroupRepo::upsert_course_link(&mut *tx, group, course, false, None, None)
        .await
        .unwrap();

    let outcome = ledger::unenroll(&mut *tx, student, course).await.unwrap();
    assert_eq!(outcome.transition, EnrollmentTransition::SourceChanged);
    let record = outcome.enrollment.unwrap();
    assert!(record.is_enrolled());
    assert_eq!(record.enrolled_by_group_id, Some(group));

    // A group-sourced record is not removed by an administrative unenroll.
    let again = ledger::unenroll(&mut *tx, student, course).await.unwrap();
    assert_eq!(again.transition, EnrollmentTransition::Unchanged);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unenroll_without_record_is_not_found(pool: PgPool) {
    let student = common::seed_student(&pool, "s@campus.test").await;
    let course = common::seed_course(&pool, "Rust", 0, None).await;

    let mut conn = pool.acquire().await.unwrap();
    let err = ledger::unenroll(&mut *conn, student, course).await.unwrap_err();
    assert_matches!(
        err,
        AppError::Core(CoreError::NotFound {
            entity: "Enrollment",
            ..
        })
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn bulk_enroll_conflict_names_enrolled_students_and_enrolls_nobody(pool: PgPool) {
    let admin = common::seed_admin(&pool).await;
    let a = common::seed_student(&pool, "a@campus.test").await;
    let b = common::seed_student(&pool, "b@campus.test").await;
    let course = common::seed_course(&pool, "Rust", 0, None).await;
    let state = common::test_state(pool.clone(), ProviderRegistry::new());

    ledger::bulk_enroll(&state, course, &[b], admin).await.unwrap();

    let app = common::build_test_app(state);
    let response = post_json_auth(
        app,
        &format!("/api/v1/admin/courses/{course}/enrollments"),
        &common::token_for(admin, ROLE_ADMIN),
        serde_json::json!({ "user_ids": [a, b] }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "ALREADY_ENROLLED");
    assert_eq!(json["details"]["user_ids"], serde_json::json!([b]));

    let a_record = EnrollmentRepo::find(&pool, a, course).await.unwrap();
    assert!(!a_record.is_some_and(|e| e.is_enrolled()));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn bulk_enroll_then_admin_unenroll_over_http(pool: PgPool) {
    let admin = common::seed_admin(&pool).await;
    let a = common::seed_student(&pool, "a@campus.test").await;
    let b = common::seed_student(&pool, "b@campus.test").await;
    let course = common::seed_course(&pool, "Rust", 0, None).await;
    let app = common::build_test_app(common::test_state(pool.clone(), ProviderRegistry::new()));
    let admin_token = common::token_for(admin, ROLE_ADMIN);

    let response = post_json_auth(
        app.clone(),
        &format!("/api/v1/admin/courses/{course}/enrollments"),
        &admin_token,
        serde_json::json!({ "user_ids": [a, b, a] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);

    let response = delete_auth(
        app.clone(),
        &format!("/api/v1/admin/courses/{course}/enrollments/{a}"),
        &admin_token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["enrolled_at"], serde_json::Value::Null);

    let response = get_auth(
        app.clone(),
        &format!("/api/v1/enrollments/{course}"),
        &common::token_for(b, ROLE_STUDENT),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get_auth(app, "/api/v1/enrollments", &common::token_for(a, ROLE_STUDENT)).await;
    let json = body_json(response).await;
    assert_eq!(json["data"], serde_json::json!([]));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn bulk_enroll_unknown_user_is_404(pool: PgPool) {
    let admin = common::seed_admin(&pool).await;
    let course = common::seed_course(&pool, "Rust", 0, None).await;
    let state = common::test_state(pool, ProviderRegistry::new());

    let err = ledger::bulk_enroll(&state, course, &[999_999], admin)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        AppError::Core(CoreError::NotFound {
            entity: "User",
            id: 999_999
        })
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_first_enrollments_converge_on_one_record(pool: PgPool) {
    let student = common::seed_student(&pool, "s@campus.test").await;
    let course = common::seed_course(&pool, "Rust", 0, None).await;
    let group = common::seed_group(&pool, "Cohort").await;

    // A payment confirmation holds its transaction open while a cascade
    // enrolls the same pair through a group.
    let direct = async {
        let mut tx = pool.begin().await.unwrap();
        let outcome = ledger::enroll(
            &mut *tx,
            student,
            course,
            EnrollmentSource::Direct,
            Some("pay_1"),
            EnrollMode::Idempotent,
        )
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        tx.commit().await.unwrap();
        outcome
    };
    let via_group = async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        let mut tx = pool.begin().await.unwrap();
        let outcome = ledger::enroll(
            &mut *tx,
            student,
            course,
            EnrollmentSource::Group(group),
            None,
            EnrollMode::Idempotent,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        outcome
    };
    let (first, second) = tokio::join!(direct, via_group);

    let created = [&first, &second]
        .iter()
        .filter(|o| o.transition == EnrollmentTransition::Enrolled)
        .count();
    assert_eq!(created, 1);
    assert_eq!(
        [&first, &second].iter().filter(|o| o.progress.is_some()).count(),
        1
    );
    assert_eq!(
        [&first, &second].iter().filter(|o| o.event().is_some()).count(),
        1
    );

    let (rows,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM enrollments WHERE user_id = $1 AND course_id = $2",
    )
    .bind(student)
    .bind(course)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(rows, 1);

    let record = EnrollmentRepo::find(&pool, student, course).await.unwrap().unwrap();
    assert!(record.is_enrolled());
    assert_eq!(record.enrolled_by_group_id, None);
    assert_eq!(record.payment_id.as_deref(), Some("pay_1"));
    assert_eq!(
        ProgressRepo::count_for_course(&pool, student, course).await.unwrap(),
        (1, 2)
    );
}
