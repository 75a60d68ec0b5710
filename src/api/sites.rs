use axum::http::StatusCode;

use crate::api::extract::ApiJson;
use crate::auth::models::AuthenticatedUser;
use crate::db::models::{AccessPoint, Site};
use crate::error::AppError;
use crate::services::sites::{self, CreateAccessPointRequest, CreateSiteRequest};

pub async fn list_sites_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
) -> Result<axum::Json<Vec<Site>>, AppError> {
    Ok(axum::Json(sites::list_sites(&state, &user).await?))
}

/// Axum handler for `POST /api/sites`. Admin only, limited by the plan.
pub async fn create_site_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<CreateSiteRequest>,
) -> Result<(StatusCode, axum::Json<Site>), AppError> {
    let site = sites::create_site(&state, &user, request).await?;
    Ok((StatusCode::CREATED, axum::Json(site)))
}

pub async fn get_site_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> Result<axum::Json<Site>, AppError> {
    Ok(axum::Json(sites::get_site(&state, &user, &id).await?))
}

pub async fn list_access_points_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> Result<axum::Json<Vec<AccessPoint>>, AppError> {
    Ok(axum::Json(sites::list_access_points(&state, &user, &id).await?))
}

pub async fn create_access_point_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    axum::extract::Path(id): axum::extract::Path<String>,
    ApiJson(request): ApiJson<CreateAccessPointRequest>,
) -> Result<(StatusCode, axum::Json<AccessPoint>), AppError> {
    let access_point = sites::create_access_point(&state, &user, &id, request).await?;
    Ok((StatusCode::CREATED, axum::Json(access_point)))
}

/// Axum handler for `DELETE /api/sites/{id}/access-points/{access_point_id}` (soft delete).
pub async fn delete_access_point_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    axum::extract::Path((id, access_point_id)): axum::extract::Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    sites::deactivate_access_point(&state, &user, &id, &access_point_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
