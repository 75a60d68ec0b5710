use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;

use crate::app::AppState;
use crate::auth::models::AuthenticatedUser;
use crate::db::models::User;
use crate::error::AppError;

/// Build an `AuthenticatedUser` from a stored user record.
pub fn build_authenticated_user(user: &User) -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: user.id.clone(),
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role,
        tenant_id: user.tenant_id.clone(),
        site_id: user.site_id.clone(),
    }
}

/// Verify a raw token and load its user.
///
/// The role and site assignment come from the stored user, not the token,
/// so changes take effect without re-login.
pub async fn authenticate_token(state: &AppState, token: &str) -> Result<AuthenticatedUser, AppError> {
    let claims = state.jwt.verify(token)?;

    let user = state
        .users
        .find_by_id(&claims.sub)
        .await?
        .ok_or_else(|| AppError::Auth("User no longer exists".into()))?;

    if !user.is_active {
        return Err(AppError::Auth("Account is disabled".into()));
    }

    Ok(build_authenticated_user(&user))
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Auth("Missing or malformed bearer token".into()))?;

        authenticate_token(state, bearer.token()).await
    }
}
