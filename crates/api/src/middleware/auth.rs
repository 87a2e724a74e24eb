//! Bearer-token authentication for handlers.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use campus_core::error::CoreError;
use campus_core::roles::{ALL_ROLES, ROLE_ADMIN};
use campus_core::types::DbId;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// The caller, taken from a valid `Authorization: Bearer <jwt>` header.
///
/// Handlers that take an `AuthUser` reject anonymous requests with 401.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: DbId,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }

    /// 403 unless the caller is an admin.
    pub fn ensure_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            return Ok(());
        }
        Err(AppError::Core(CoreError::Forbidden(
            "Admin role required".into(),
        )))
    }

    /// 403 unless the caller owns the `entity` or is an admin.
    pub fn ensure_can_view(&self, owner_id: DbId, entity: &str) -> Result<(), AppError> {
        if self.user_id == owner_id || self.is_admin() {
            return Ok(());
        }
        Err(AppError::Core(CoreError::Forbidden(format!(
            "{entity} belongs to another user"
        ))))
    }
}

fn unauthorized(message: &str) -> AppError {
    AppError::Core(CoreError::Unauthorized(message.to_string()))
}

/// The raw token from the `Authorization` header.
fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| unauthorized("Malformed Authorization header"))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| unauthorized("Expected: Authorization: Bearer <token>"))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = validate_token(token, &state.config.jwt)
            .map_err(|_| unauthorized("Invalid or expired token"))?;

        if !ALL_ROLES.contains(&claims.role.as_str()) {
            tracing::warn!(user_id = claims.sub, role = %claims.role, "Token with unknown role");
            return Err(unauthorized("Invalid or expired token"));
        }

        Ok(AuthUser {
            user_id: claims.sub,
            role: claims.role,
        })
    }
}
