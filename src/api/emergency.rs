use serde::Deserialize;

use crate::api::extract::{ApiJson, ApiQuery};
use crate::auth::models::AuthenticatedUser;
use crate::error::AppError;
use crate::services::emergency::{self, ActivateRequest, DeactivateRequest, EmergencyStatus, RollCall};

/// `?site_id=` of the read-only emergency endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct SiteParams {
    #[serde(default)]
    pub site_id: String,
}

pub async fn activate_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<ActivateRequest>,
) -> Result<axum::Json<EmergencyStatus>, AppError> {
    Ok(axum::Json(emergency::activate(&state, &user, request).await?))
}

pub async fn deactivate_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<DeactivateRequest>,
) -> Result<axum::Json<EmergencyStatus>, AppError> {
    Ok(axum::Json(emergency::deactivate(&state, &user, request).await?))
}

/// Axum handler for `GET /api/emergency/status?site_id=`.
pub async fn status_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    ApiQuery(params): ApiQuery<SiteParams>,
) -> Result<axum::Json<EmergencyStatus>, AppError> {
    Ok(axum::Json(emergency::status(&state, &user, &params.site_id).await?))
}

/// Axum handler for `GET /api/emergency/roll-call?site_id=`.
pub async fn roll_call_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    ApiQuery(params): ApiQuery<SiteParams>,
) -> Result<axum::Json<RollCall>, AppError> {
    Ok(axum::Json(emergency::roll_call(&state, &user, &params.site_id).await?))
}
