use axum::http::StatusCode;

use crate::api::extract::{ApiJson, ApiQuery};
use crate::auth::models::AuthenticatedUser;
use crate::db::models::Visitor;
use crate::error::AppError;
use crate::services::visitors::{
    self, BadgeCheckOutRequest, CheckInRequest, CheckInResponse, VisitorListParams,
};

/// Axum handler for `GET /api/visitors?site_id=&status=&limit=`.
pub async fn list_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    ApiQuery(params): ApiQuery<VisitorListParams>,
) -> Result<axum::Json<Vec<Visitor>>, AppError> {
    Ok(axum::Json(visitors::list(&state, &user, params).await?))
}

/// Axum handler for `POST /api/visitors/check-in`.
///
/// Returns the stored visitor together with the QR payload printed on the badge.
pub async fn check_in_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<CheckInRequest>,
) -> Result<(StatusCode, axum::Json<CheckInResponse>), AppError> {
    let response = visitors::check_in(&state, &user, request).await?;
    Ok((StatusCode::CREATED, axum::Json(response)))
}

pub async fn get_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> Result<axum::Json<Visitor>, AppError> {
    Ok(axum::Json(visitors::get(&state, &user, &id).await?))
}

pub async fn check_out_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> Result<axum::Json<Visitor>, AppError> {
    Ok(axum::Json(visitors::check_out(&state, &user, &id).await?))
}

/// Axum handler for `POST /api/visitors/check-out/badge` with body `{ "qr": ... }`.
pub async fn check_out_by_badge_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<BadgeCheckOutRequest>,
) -> Result<axum::Json<Visitor>, AppError> {
    Ok(axum::Json(visitors::check_out_by_badge(&state, &user, request).await?))
}
