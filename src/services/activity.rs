use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::models::AuthenticatedUser;
use crate::db::activity_repository::TimelineQuery;
use crate::db::models::{new_id, Activity, ActivityAlert, Severity};
use crate::error::{AppError, FieldError};
use crate::realtime::hub::LiveEvent;
use crate::tenant::resolve_scope;

/// What to write to the activity log.
#[derive(Debug, Clone)]
pub struct ActivityDraft {
    pub tenant_id: String,
    pub site_id: Option<String>,
    pub actor_id: String,
    pub action: &'static str,
    pub entity_type: &'static str,
    pub entity_id: String,
    pub description: String,
}

/// What to raise as an alert.
#[derive(Debug, Clone)]
pub struct AlertDraft {
    pub tenant_id: String,
    pub site_id: Option<String>,
    pub activity_id: Option<String>,
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

/// Store an activity and push it live.
///
/// Best-effort: a storage failure is logged and yields `None`.
pub async fn record_activity(state: &AppState, draft: ActivityDraft) -> Option<Activity> {
    let activity = Activity {
        id: new_id(),
        tenant_id: draft.tenant_id,
        site_id: draft.site_id,
        actor_id: draft.actor_id,
        action: draft.action.to_string(),
        entity_type: draft.entity_type.to_string(),
        entity_id: draft.entity_id,
        description: draft.description,
        created_at: Utc::now(),
    };

    if let Err(e) = state.activities.insert_activity(&activity).await {
        tracing::warn!("Failed to record activity '{}': {e}", activity.action);
        return None;
    }

    state.hub.publish(LiveEvent::Activity(activity.clone()));
    Some(activity)
}

/// Store an alert and push it live. Best-effort like [`record_activity`].
pub async fn raise_alert(state: &AppState, draft: AlertDraft) -> Option<ActivityAlert> {
    let alert = ActivityAlert {
        id: new_id(),
        tenant_id: draft.tenant_id,
        site_id: draft.site_id,
        activity_id: draft.activity_id,
        severity: draft.severity,
        title: draft.title,
        message: draft.message,
        read_by: vec![],
        created_at: Utc::now(),
    };

    if let Err(e) = state.activities.insert_alert(&alert).await {
        tracing::warn!("Failed to raise alert '{}': {e}", alert.title);
        return None;
    }

    state.hub.publish(LiveEvent::Alert(alert.clone()));
    Some(alert)
}

/// Record an activity and, when it succeeds, an alert linked to it.
pub async fn record_with_alert(
    state: &AppState,
    draft: ActivityDraft,
    severity: Severity,
    title: String,
) -> Option<ActivityAlert> {
    let tenant_id = draft.tenant_id.clone();
    let site_id = draft.site_id.clone();
    let message = draft.description.clone();
    let activity = record_activity(state, draft).await;

    raise_alert(
        state,
        AlertDraft {
            tenant_id,
            site_id,
            activity_id: activity.map(|a| a.id),
            severity,
            title,
            message,
        },
    )
    .await
}

/// Query string of the activity and timeline endpoints. Times are Unix milliseconds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimelineParams {
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub from: Option<i64>,
    #[serde(default)]
    pub to: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

fn millis(field: &str, value: Option<i64>) -> Result<Option<DateTime<Utc>>, AppError> {
    match value {
        None => Ok(None),
        Some(ms) => DateTime::from_timestamp_millis(ms).map(Some).ok_or_else(|| {
            AppError::Validation(vec![FieldError::new(field, "is not a valid timestamp")])
        }),
    }
}

/// Activities in the caller's scope within `[from, to)`, newest first.
pub async fn timeline(
    state: &AppState,
    user: &AuthenticatedUser,
    params: TimelineParams,
) -> Result<Vec<Activity>, AppError> {
    let from = millis("from", params.from)?;
    let to = millis("to", params.to)?;
    if let (Some(from), Some(to)) = (from, to) {
        if from >= to {
            return Err(AppError::Validation(vec![FieldError::new(
                "to",
                "must be later than from",
            )]));
        }
    }

    let scope = resolve_scope(state.sites.as_ref(), user, params.site_id.as_deref()).await?;
    let query = TimelineQuery {
        from,
        to,
        limit: super::clamp_limit(params.limit),
    };

    state.activities.list_activities(&scope, &query).await
}

/// Alerts in the caller's scope; `unread_only` hides those the caller dismissed.
pub async fn list_alerts(
    state: &AppState,
    user: &AuthenticatedUser,
    site_id: Option<&str>,
    unread_only: bool,
    limit: Option<i64>,
) -> Result<Vec<ActivityAlert>, AppError> {
    let scope = resolve_scope(state.sites.as_ref(), user, site_id).await?;
    let unread_for = unread_only.then_some(user.user_id.as_str());

    state
        .activities
        .list_alerts(&scope, unread_for, super::clamp_limit(limit))
        .await
}

/// Dismiss an alert for the caller.
pub async fn mark_alert_read(
    state: &AppState,
    user: &AuthenticatedUser,
    alert_id: &str,
) -> Result<(), AppError> {
    let alert = state
        .activities
        .find_alert(alert_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Alert '{}' not found", alert_id)))?;

    let scope = resolve_scope(state.sites.as_ref(), user, None).await?;
    if !scope.admits(&alert.tenant_id, alert.site_id.as_deref()) {
        return Err(AppError::Forbidden("Alert is outside this account's scope".into()));
    }

    state.activities.mark_alert_read(alert_id, &user.user_id).await
}
