//! Role-gated extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// An [`AuthUser`] with the `admin` role; 403 for anyone else.
///
/// ```ignore
/// async fn bulk_enroll(RequireAdmin(admin): RequireAdmin) -> AppResult<StatusCode> { .. }
/// ```
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.ensure_admin()?;
        Ok(RequireAdmin(user))
    }
}
