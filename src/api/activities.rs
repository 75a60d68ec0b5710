use axum::http::StatusCode;
use serde::Deserialize;

use crate::api::extract::ApiQuery;
use crate::auth::models::AuthenticatedUser;
use crate::db::models::{Activity, ActivityAlert};
use crate::error::AppError;
use crate::services::activity::{self, TimelineParams};

#[derive(Debug, Default, Deserialize)]
pub struct ActivityListParams {
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Axum handler for `GET /api/activities?site_id=&limit=`: the latest activities, unbounded in time.
pub async fn list_activities_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    ApiQuery(params): ApiQuery<ActivityListParams>,
) -> Result<axum::Json<Vec<Activity>>, AppError> {
    let params = TimelineParams {
        site_id: params.site_id,
        limit: params.limit,
        ..Default::default()
    };
    Ok(axum::Json(activity::timeline(&state, &user, params).await?))
}

/// Axum handler for `GET /api/timeline?site_id=&from=&to=&limit=`.
pub async fn timeline_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    ApiQuery(params): ApiQuery<TimelineParams>,
) -> Result<axum::Json<Vec<Activity>>, AppError> {
    Ok(axum::Json(activity::timeline(&state, &user, params).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertListParams {
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub unread: bool,
    #[serde(default)]
    pub limit: Option<i64>,
}

pub async fn list_alerts_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    ApiQuery(params): ApiQuery<AlertListParams>,
) -> Result<axum::Json<Vec<ActivityAlert>>, AppError> {
    let alerts = activity::list_alerts(
        &state,
        &user,
        params.site_id.as_deref(),
        params.unread,
        params.limit,
    )
    .await?;
    Ok(axum::Json(alerts))
}

/// Axum handler for `POST /api/alerts/{id}/read`.
pub async fn mark_read_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> Result<StatusCode, AppError> {
    activity::mark_alert_read(&state, &user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
