use axum::http::StatusCode;

use crate::api::extract::ApiJson;
use crate::auth::models::AuthenticatedUser;
use crate::db::models::Subscription;
use crate::error::AppError;
use crate::services::subscription::{self, ChangePlanRequest, SetStatusRequest, SubscriptionOverview};

/// Axum handler for `GET /api/subscriptions/me`. Never gated, so lapsed tenants can see why.
pub async fn me_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
) -> Result<axum::Json<SubscriptionOverview>, AppError> {
    Ok(axum::Json(subscription::get_mine(&state, &user).await?))
}

pub async fn trial_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
) -> Result<(StatusCode, axum::Json<Subscription>), AppError> {
    let subscription = subscription::start_trial(&state, &user).await?;
    Ok((StatusCode::CREATED, axum::Json(subscription)))
}

pub async fn change_plan_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<ChangePlanRequest>,
) -> Result<axum::Json<Subscription>, AppError> {
    Ok(axum::Json(subscription::change_plan(&state, &user, request).await?))
}

pub async fn cancel_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
) -> Result<axum::Json<Subscription>, AppError> {
    Ok(axum::Json(subscription::cancel(&state, &user).await?))
}

/// Axum handler for `PUT /api/subscriptions/{tenant_id}/status` (super admin).
pub async fn set_status_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    axum::extract::Path(tenant_id): axum::extract::Path<String>,
    ApiJson(request): ApiJson<SetStatusRequest>,
) -> Result<axum::Json<Subscription>, AppError> {
    Ok(axum::Json(
        subscription::set_status(&state, &user, &tenant_id, request).await?,
    ))
}
