use axum::http::StatusCode;
use serde::Deserialize;

use crate::api::extract::{ApiJson, ApiQuery};
use crate::auth::models::AuthenticatedUser;
use crate::db::models::BannedVisitor;
use crate::error::AppError;
use crate::services::banned::{self, BanCheckRequest, BanCheckResponse, CreateBanRequest};

#[derive(Debug, Default, Deserialize)]
pub struct BanListParams {
    #[serde(default)]
    pub site_id: Option<String>,
}

/// Axum handler for `GET /api/banned?site_id=`. Lists active bans only.
pub async fn list_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    ApiQuery(params): ApiQuery<BanListParams>,
) -> Result<axum::Json<Vec<BannedVisitor>>, AppError> {
    let bans = banned::list_bans(&state, &user, params.site_id.as_deref()).await?;
    Ok(axum::Json(bans))
}

pub async fn create_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<CreateBanRequest>,
) -> Result<(StatusCode, axum::Json<BannedVisitor>), AppError> {
    let ban = banned::create_ban(&state, &user, request).await?;
    Ok((StatusCode::CREATED, axum::Json(ban)))
}

/// Axum handler for `POST /api/banned/check`.
pub async fn check_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<BanCheckRequest>,
) -> Result<axum::Json<BanCheckResponse>, AppError> {
    Ok(axum::Json(banned::check(&state, &user, request).await?))
}

pub async fn delete_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> Result<StatusCode, AppError> {
    banned::deactivate_ban(&state, &user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
