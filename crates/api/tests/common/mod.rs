#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, Response};
use axum::Router;
use campus_api::router::build_app_router;
use campus_api::auth::jwt::{issue_access_token, JwtConfig};
use campus_api::config::ServerConfig;
use campus_api::state::AppState;
use campus_core::roles::{ROLE_ADMIN, ROLE_STUDENT};
use campus_core::types::{Cents, DbId};
use campus_db::models::course::CreateCourse;
use campus_db::models::user::CreateUser;
use campus_db::repositories::{CourseRepo, GroupRepo, UserRepo};
use campus_events::EventBus;
use campus_payments::ProviderRegistry;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tokio_util::task::TaskTracker;
use tower::ServiceExt;

const TEST_JWT_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        event_bus_capacity: 1024,
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

/// Application state over the test pool with the given provider adapters.
pub fn test_state(pool: PgPool, providers: ProviderRegistry) -> AppState {
    AppState {
        pool,
        config: Arc::new(test_config()),
        event_bus: Arc::new(EventBus::default()),
        providers: Arc::new(providers),
        background: TaskTracker::new(),
    }
}

/// The production router over `state`.
pub fn build_test_app(state: AppState) -> Router {
    build_app_router(state)
}

/// A bearer token for the given user.
pub fn token_for(user_id: DbId, role: &str) -> String {
    issue_access_token(user_id, role, &test_config().jwt).expect("token generation")
}

// ---------------------------------------------------------------------------
// Seed helpers
// ---------------------------------------------------------------------------

pub async fn seed_user(pool: &PgPool, email: &str, role: &str) -> DbId {
    UserRepo::create(
        pool,
        &CreateUser {
            email: email.to_string(),
            name: email.to_string(),
            role: Some(role.to_string()),
        },
    )
    .await
    .expect("create user")
    .id
}

pub async fn seed_student(pool: &PgPool, email: &str) -> DbId {
    seed_user(pool, email, ROLE_STUDENT).await
}

pub async fn seed_admin(pool: &PgPool) -> DbId {
    seed_user(pool, "admin@campus.test", ROLE_ADMIN).await
}

/// A course with one chapter holding two lessons.
pub async fn seed_course(
    pool: &PgPool,
    title: &str,
    price_in_cents: Cents,
    stripe_price_id: Option<&str>,
) -> DbId {
    let course = CourseRepo::create(
        pool,
        &CreateCourse {
            title: title.to_string(),
            price_in_cents,
            currency: "USD".to_string(),
            stripe_price_id: stripe_price_id.map(str::to_string),
        },
    )
    .await
    .expect("create course");
    let chapter = CourseRepo::add_chapter(pool, course.id, "Intro", 1)
        .await
        .expect("create chapter");
    CourseRepo::add_lesson(pool, chapter.id, "Welcome", 1)
        .await
        .expect("create lesson");
    CourseRepo::add_lesson(pool, chapter.id, "Setup", 2)
        .await
        .expect("create lesson");
    course.id
}

pub async fn seed_group(pool: &PgPool, name: &str) -> DbId {
    GroupRepo::create(pool, name).await.expect("create group").id
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), None).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn put_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), None).await
}

pub async fn delete_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), Some(body)).await
}

/// POST a raw body with a JSON content type and no credentials.
pub async fn post_raw(app: Router, uri: &str, body: impl Into<String>) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.into()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
