use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use campus_core::error::CoreError;
use campus_payments::ProviderError;
use serde_json::json;

/// Error returned by the engine and the handlers.
///
/// Renders as `{ "error", "code", "details"? }`. `details` carries the ids a
/// client needs to recover, e.g. the already-enrolled course ids of a
/// rejected checkout.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type AppResult<T> = Result<T, AppError>;

type Rendered = (StatusCode, &'static str, String);

/// 500 with a message that leaks nothing.
fn internal() -> Rendered {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut details = None;
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal()
                }
                CoreError::EmptyCart => (StatusCode::BAD_REQUEST, "EMPTY_CART", core.to_string()),
                CoreError::NoFreeItems => {
                    (StatusCode::BAD_REQUEST, "NO_FREE_ITEMS", core.to_string())
                }
                CoreError::AlreadyEnrolled { course_ids } => {
                    details = Some(json!({ "course_ids": course_ids }));
                    (StatusCode::CONFLICT, "ALREADY_ENROLLED", core.to_string())
                }
                CoreError::StudentsAlreadyEnrolled { user_ids } => {
                    details = Some(json!({ "user_ids": user_ids }));
                    (StatusCode::CONFLICT, "ALREADY_ENROLLED", core.to_string())
                }
                CoreError::NotLinked { group_id } => {
                    details = Some(json!({ "group_id": group_id }));
                    (StatusCode::NOT_FOUND, "NOT_LINKED", core.to_string())
                }
            },

            AppError::Database(err) => classify_sqlx_error(err),

            AppError::Provider(err) => {
                tracing::error!(error = %err, "Payment provider error");
                (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", err.to_string())
            }

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        (status, axum::Json(body)).into_response()
    }
}

/// Unique violations on `uq_*` constraints are client conflicts. Anything
/// else from the database is a 500.
fn classify_sqlx_error(err: &sqlx::Error) -> Rendered {
    if let sqlx::Error::RowNotFound = err {
        return (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        );
    }
    if let Some(db_err) = err.as_database_error() {
        let constraint = db_err.constraint().unwrap_or_default();
        if db_err.is_unique_violation() && constraint.starts_with("uq_") {
            return (
                StatusCode::CONFLICT,
                "CONFLICT",
                format!("Duplicate value violates unique constraint: {constraint}"),
            );
        }
    }
    tracing::error!(error = %err, "Database error");
    internal()
}
