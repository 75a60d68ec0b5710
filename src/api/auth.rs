use axum::http::StatusCode;

use crate::api::extract::ApiJson;
use crate::auth::models::AuthenticatedUser;
use crate::db::models::UserProfile;
use crate::error::AppError;
use crate::services::accounts::{self, AuthResponse, CreateStaffRequest, LoginRequest, RegisterRequest};

/// Axum handler for `POST /api/auth/register`.
pub async fn register_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, axum::Json<AuthResponse>), AppError> {
    let response = accounts::register(&state, request).await?;
    Ok((StatusCode::CREATED, axum::Json(response)))
}

/// Axum handler for `POST /api/auth/login`.
pub async fn login_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<axum::Json<AuthResponse>, AppError> {
    Ok(axum::Json(accounts::login(&state, request).await?))
}

/// Axum handler for `GET /api/auth/me`.
pub async fn me_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
) -> Result<axum::Json<UserProfile>, AppError> {
    Ok(axum::Json(accounts::me(&state, &user).await?))
}

/// Axum handler for `GET /api/auth/staff`.
pub async fn list_staff_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
) -> Result<axum::Json<Vec<UserProfile>>, AppError> {
    Ok(axum::Json(accounts::list_staff(&state, &user).await?))
}

/// Axum handler for `POST /api/auth/staff`.
pub async fn create_staff_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<CreateStaffRequest>,
) -> Result<(StatusCode, axum::Json<UserProfile>), AppError> {
    let staff = accounts::create_staff(&state, &user, request).await?;
    Ok((StatusCode::CREATED, axum::Json(staff)))
}
