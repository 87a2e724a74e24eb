//! Payment webhook reconciliation.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use campus_api::engine::checkout::{self, ChargeInput};
use campus_api::engine::reconciler;
use campus_api::state::AppState;
use campus_core::status::OrderStatus;
use campus_core::types::DbId;
use campus_core::webhook::WebhookNotification;
use campus_db::repositories::{CartRepo, EnrollmentRepo, OrderRepo, PaymentRepo, ProgressRepo};
use campus_events::bus::{ENROLLMENT_CREATED, ORDER_COMPLETED};
use campus_payments::testing::ScriptedProvider;
use campus_payments::{PaymentStatus, ProviderKind, ProviderRegistry};
use common::post_raw;
use serde_json::json;
use sqlx::PgPool;

fn notification(value: serde_json::Value) -> WebhookNotification {
    serde_json::from_value(value).unwrap()
}

fn payment_notification(external_id: &str) -> WebhookNotification {
    notification(json!({ "type": "payment", "data": { "id": external_id } }))
}

async fn order_status(pool: &PgPool, order_id: DbId) -> Option<OrderStatus> {
    OrderRepo::find_by_id(pool, order_id)
        .await
        .unwrap()
        .unwrap()
        .status()
}

async fn is_enrolled(pool: &PgPool, user_id: DbId, course_id: DbId) -> bool {
    EnrollmentRepo::find(pool, user_id, course_id)
        .await
        .unwrap()
        .is_some_and(|e| e.is_enrolled())
}

/// A student with one paid course in the cart, checked out by card.
/// Returns `(state, provider, student, course, order_id)`.
async fn card_order(pool: &PgPool) -> (AppState, Arc<ScriptedProvider>, DbId, DbId, DbId) {
    let student = common::seed_student(pool, "s@campus.test").await;
    let course = common::seed_course(pool, "Paid", 1999, Some("price_paid")).await;
    CartRepo::add(pool, student, course).await.unwrap();

    let provider = Arc::new(ScriptedProvider::new(ProviderKind::Stripe));
    let state = common::test_state(
        pool.clone(),
        ProviderRegistry::new().with(provider.clone()),
    );
    let outcome = checkout::card_checkout(&state, student).await.unwrap();
    let order_id = outcome.order.unwrap().order.id;
    (state, provider, student, course, order_id)
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn webhook_endpoint_always_answers_ok(pool: PgPool) {
    let app = common::build_test_app(common::test_state(pool, ProviderRegistry::new()));

    let response = post_raw(app.clone(), "/api/v1/webhooks/stripe", "not json").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_raw(app.clone(), "/api/v1/webhooks/paypal", "{}").await;
    assert_eq!(response.status(), StatusCode::OK);

    // Not configured: processing fails in the background, the answer is still 200.
    let response = post_raw(
        app,
        "/api/v1/webhooks/mercadopago",
        r#"{"type":"payment","data":{"id":1}}"#,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn approved_webhook_over_http_completes_card_order(pool: PgPool) {
    let (state, provider, student, course, order_id) = card_order(&pool).await;
    let external_id = ScriptedProvider::session_payment_id(order_id);
    provider.set_status(&external_id, PaymentStatus::Approved, Some(order_id));

    let app = common::build_test_app(state.clone());
    let body = json!({ "type": "payment", "data": { "id": external_id } }).to_string();
    let response = post_raw(app, "/api/v1/webhooks/stripe", body).await;
    assert_eq!(response.status(), StatusCode::OK);

    state.background.close();
    state.background.wait().await;

    assert_eq!(order_status(&pool, order_id).await, Some(OrderStatus::Completed));
    assert!(is_enrolled(&pool, student, course).await);

    // No payment row existed for the session; it is created from the order.
    let payment = PaymentRepo::find_by_provider_id(&pool, "stripe", &external_id)
        .await
        .unwrap()
        .expect("payment recorded");
    assert_eq!(payment.order_id, Some(order_id));
    assert_eq!(payment.status, "approved");
    assert_eq!(payment.user_id, student);
    assert_eq!(payment.course_id, Some(course));

    let cart = CartRepo::checkout_rows(&pool, student).await.unwrap();
    assert!(cart.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn repeated_approved_notification_enrolls_once(pool: PgPool) {
    let (state, provider, student, course, order_id) = card_order(&pool).await;
    let external_id = ScriptedProvider::session_payment_id(order_id);
    provider.set_status(&external_id, PaymentStatus::Approved, Some(order_id));
    let mut rx = state.event_bus.subscribe();

    let n = payment_notification(&external_id);
    assert!(reconciler::handle_notification(&state, ProviderKind::Stripe, &n).await.unwrap());
    let first = EnrollmentRepo::find(&pool, student, course).await.unwrap().unwrap();
    assert!(reconciler::handle_notification(&state, ProviderKind::Stripe, &n).await.unwrap());
    let second = EnrollmentRepo::find(&pool, student, course).await.unwrap().unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.enrolled_at, second.enrolled_at);
    assert_eq!(second.payment_id.as_deref(), Some(external_id.as_str()));
    assert_eq!(
        ProgressRepo::count_for_course(&pool, student, course).await.unwrap(),
        (1, 2)
    );
    assert_eq!(PaymentRepo::list_for_order(&pool, order_id).await.unwrap().len(), 1);
    assert_eq!(provider.fetch_count(), 2);

    let mut created = 0;
    while let Ok(event) = rx.try_recv() {
        if event.event_type == ENROLLMENT_CREATED {
            created += 1;
        }
    }
    assert_eq!(created, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn rejected_payment_keeps_the_order_open(pool: PgPool) {
    let (state, provider, student, course, order_id) = card_order(&pool).await;
    let external_id = ScriptedProvider::session_payment_id(order_id);
    let n = payment_notification(&external_id);

    provider.set_status(&external_id, PaymentStatus::InProcess, Some(order_id));
    assert!(reconciler::handle_notification(&state, ProviderKind::Stripe, &n).await.unwrap());
    assert_eq!(order_status(&pool, order_id).await, Some(OrderStatus::Processing));

    provider.set_status(&external_id, PaymentStatus::Rejected, Some(order_id));
    assert!(reconciler::handle_notification(&state, ProviderKind::Stripe, &n).await.unwrap());
    assert_eq!(order_status(&pool, order_id).await, Some(OrderStatus::Processing));
    assert!(!is_enrolled(&pool, student, course).await);

    let payments = PaymentRepo::list_for_order(&pool, order_id).await.unwrap();
    assert_eq!(payments[0].status, "rejected");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn approved_retry_after_rejection_completes_the_order(pool: PgPool) {
    let (state, provider, student, course, order_id) = card_order(&pool).await;

    provider.set_status("attempt_1", PaymentStatus::Rejected, Some(order_id));
    let first = payment_notification("attempt_1");
    assert!(reconciler::handle_notification(&state, ProviderKind::Stripe, &first)
        .await
        .unwrap());
    assert_eq!(order_status(&pool, order_id).await, Some(OrderStatus::Processing));

    provider.set_status("attempt_2", PaymentStatus::Approved, Some(order_id));
    let retry = payment_notification("attempt_2");
    assert!(reconciler::handle_notification(&state, ProviderKind::Stripe, &retry)
        .await
        .unwrap());

    assert_eq!(order_status(&pool, order_id).await, Some(OrderStatus::Completed));
    let enrollment = EnrollmentRepo::find(&pool, student, course).await.unwrap().unwrap();
    assert!(enrollment.is_enrolled());
    assert_eq!(enrollment.payment_id.as_deref(), Some("attempt_2"));
    assert_eq!(PaymentRepo::list_for_order(&pool, order_id).await.unwrap().len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn approval_completes_an_order_written_off_as_failed(pool: PgPool) {
    let (state, provider, student, course, order_id) = card_order(&pool).await;
    let mut conn = pool.acquire().await.unwrap();
    OrderRepo::transition(&mut *conn, order_id, OrderStatus::Failed)
        .await
        .unwrap()
        .unwrap();
    drop(conn);

    let external_id = ScriptedProvider::session_payment_id(order_id);
    provider.set_status(&external_id, PaymentStatus::Approved, Some(order_id));
    let n = payment_notification(&external_id);
    assert!(reconciler::handle_notification(&state, ProviderKind::Stripe, &n).await.unwrap());

    assert_eq!(order_status(&pool, order_id).await, Some(OrderStatus::Completed));
    assert!(is_enrolled(&pool, student, course).await);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn late_approval_after_processing_completes_direct_charge(pool: PgPool) {
    let student = common::seed_student(&pool, "s@campus.test").await;
    let course = common::seed_course(&pool, "Paid", 1999, None).await;
    CartRepo::add(&pool, student, course).await.unwrap();

    let provider = Arc::new(ScriptedProvider::new(ProviderKind::MercadoPago));
    provider.set_charge_status(PaymentStatus::InProcess);
    let state = common::test_state(
        pool.clone(),
        ProviderRegistry::new().with(provider.clone()),
    );
    let input = ChargeInput {
        token: "card_tok".into(),
        provider: None,
        payment_method_id: Some("visa".into()),
        installments: Some(1),
        payer_email: None,
    };
    let outcome = checkout::direct_charge_checkout(&state, student, &input).await.unwrap();
    let order = outcome.order.unwrap().order;
    assert_eq!(order.status(), Some(OrderStatus::Processing));
    let external_id = order.provider_payment_id.unwrap();

    provider.set_status(&external_id, PaymentStatus::Approved, Some(order.id));
    let n = payment_notification(&external_id);
    assert!(reconciler::handle_notification(&state, ProviderKind::MercadoPago, &n)
        .await
        .unwrap());

    assert_eq!(order_status(&pool, order.id).await, Some(OrderStatus::Completed));
    assert!(is_enrolled(&pool, student, course).await);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn non_payment_notification_is_dropped_without_fetching(pool: PgPool) {
    let provider = Arc::new(ScriptedProvider::new(ProviderKind::MercadoPago));
    let state = common::test_state(pool, ProviderRegistry::new().with(provider.clone()));

    let n = notification(json!({ "type": "merchant_order", "data": { "id": 9 } }));
    let handled = reconciler::handle_notification(&state, ProviderKind::MercadoPago, &n)
        .await
        .unwrap();
    assert!(!handled);
    assert_eq!(provider.fetch_count(), 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn payment_without_local_record_or_order_is_dropped(pool: PgPool) {
    let provider = Arc::new(ScriptedProvider::new(ProviderKind::MercadoPago));
    provider.set_status("mp-unknown", PaymentStatus::Approved, None);
    provider.set_status("mp-ghost-order", PaymentStatus::Approved, Some(424242));
    let state = common::test_state(pool.clone(), ProviderRegistry::new().with(provider.clone()));

    for id in ["mp-unknown", "mp-ghost-order"] {
        let n = payment_notification(id);
        let handled = reconciler::handle_notification(&state, ProviderKind::MercadoPago, &n)
            .await
            .unwrap();
        assert!(!handled, "{id} should be dropped");
    }

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payments")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn notification_for_another_providers_order_is_dropped(pool: PgPool) {
    let (_, _, _, _, order_id) = card_order(&pool).await;
    let mp = Arc::new(ScriptedProvider::new(ProviderKind::MercadoPago));
    mp.set_status("mp-1", PaymentStatus::Approved, Some(order_id));
    let state = common::test_state(pool.clone(), ProviderRegistry::new().with(mp));

    let handled = reconciler::handle_notification(
        &state,
        ProviderKind::MercadoPago,
        &payment_notification("mp-1"),
    )
    .await
    .unwrap();
    assert!(!handled);
    assert_eq!(order_status(&pool, order_id).await, Some(OrderStatus::AwaitingPayment));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_duplicate_deliveries_enroll_once(pool: PgPool) {
    let (state, provider, student, course, order_id) = card_order(&pool).await;
    let external_id = ScriptedProvider::session_payment_id(order_id);
    provider.set_status(&external_id, PaymentStatus::Approved, Some(order_id));
    let mut rx = state.event_bus.subscribe();

    let n = payment_notification(&external_id);
    let (first, second) = tokio::join!(
        reconciler::handle_notification(&state, ProviderKind::Stripe, &n),
        reconciler::handle_notification(&state, ProviderKind::Stripe, &n),
    );
    assert!(first.unwrap());
    assert!(second.unwrap());

    assert_eq!(order_status(&pool, order_id).await, Some(OrderStatus::Completed));
    assert!(is_enrolled(&pool, student, course).await);
    assert_eq!(
        ProgressRepo::count_for_course(&pool, student, course).await.unwrap(),
        (1, 2)
    );
    assert_eq!(PaymentRepo::list_for_order(&pool, order_id).await.unwrap().len(), 1);

    let (mut created, mut completed) = (0, 0);
    while let Ok(event) = rx.try_recv() {
        if event.event_type == ENROLLMENT_CREATED {
            created += 1;
        } else if event.event_type == ORDER_COMPLETED {
            completed += 1;
        }
    }
    assert_eq!((created, completed), (1, 1));
}
