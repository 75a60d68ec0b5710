use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::models::{AuthenticatedUser, Role};
use crate::db::emergency_repository::EmergencyRepository;
use crate::db::models::{new_id, EmergencyAction, EmergencyEvent, EmergencyType, Severity, Site, Visitor};
use crate::error::{AppError, FieldError};
use crate::notify::{notify_best_effort, Channel, Notification};
use crate::realtime::hub::{EmergencyNotice, LiveEvent};
use crate::services::activity::{record_activity, record_with_alert, ActivityDraft};
use crate::services::non_blank;
use crate::services::subscription::ensure_active;
use crate::tenant::require_site;

/// The activation still in force, given the latest activation and the
/// latest deactivation of a site.
pub fn active_activation(
    latest_activation: Option<EmergencyEvent>,
    latest_deactivation: Option<&EmergencyEvent>,
) -> Option<EmergencyEvent> {
    let activation = latest_activation?;
    match latest_deactivation {
        Some(deactivation) if deactivation.created_at >= activation.created_at => None,
        _ => Some(activation),
    }
}

/// Current emergency at a site, if one is active.
pub async fn current_emergency(
    emergencies: &dyn EmergencyRepository,
    site_id: &str,
) -> Result<Option<EmergencyEvent>, AppError> {
    let activation = emergencies.latest(site_id, EmergencyAction::Activate).await?;
    if activation.is_none() {
        return Ok(None);
    }
    let deactivation = emergencies.latest(site_id, EmergencyAction::Deactivate).await?;
    Ok(active_activation(activation, deactivation.as_ref()))
}

pub async fn is_active(emergencies: &dyn EmergencyRepository, site_id: &str) -> Result<bool, AppError> {
    Ok(current_emergency(emergencies, site_id).await?.is_some())
}

/// Timestamp for a new event, strictly after `previous` so the log stays ordered.
fn event_time(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(previous) if previous >= now => previous + Duration::milliseconds(1),
        _ => now,
    }
}

/// Emergency state of one site.
#[derive(Debug, Clone, Serialize)]
pub struct EmergencyStatus {
    pub site_id: String,
    pub active: bool,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub since: Option<DateTime<Utc>>,
    pub emergency_type: Option<EmergencyType>,
    pub message: Option<String>,
}

impl EmergencyStatus {
    fn from_event(site_id: &str, event: Option<&EmergencyEvent>) -> Self {
        Self {
            site_id: site_id.to_string(),
            active: event.is_some(),
            since: event.map(|e| e.created_at),
            emergency_type: event.map(|e| e.emergency_type),
            message: event.map(|e| e.message.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivateRequest {
    #[serde(default)]
    pub site_id: String,
    #[serde(default)]
    pub emergency_type: Option<EmergencyType>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Declare an emergency at a site.
pub async fn activate(
    state: &AppState,
    user: &AuthenticatedUser,
    request: ActivateRequest,
) -> Result<EmergencyStatus, AppError> {
    user.require(Role::Security)?;
    ensure_active(state, user).await?;

    let mut errors = Vec::new();
    if request.site_id.trim().is_empty() {
        errors.push(FieldError::new("site_id", "is required"));
    }
    if request.emergency_type.is_none() {
        errors.push(FieldError::new("emergency_type", "is required"));
    }
    AppError::check_fields(errors)?;

    let site = require_site(state.sites.as_ref(), user, request.site_id.trim()).await?;
    if is_active(state.emergencies.as_ref(), &site.id).await? {
        return Err(AppError::Conflict("An emergency is already active at this site".into()));
    }

    let emergency_type = request.emergency_type.unwrap_or(EmergencyType::Other);
    let previous = state
        .emergencies
        .latest(&site.id, EmergencyAction::Deactivate)
        .await?
        .map(|e| e.created_at);

    let event = EmergencyEvent {
        id: new_id(),
        tenant_id: site.tenant_id.clone(),
        site_id: site.id.clone(),
        action: EmergencyAction::Activate,
        emergency_type,
        message: non_blank(request.message).unwrap_or_else(|| default_message(emergency_type)),
        triggered_by: user.user_id.clone(),
        created_at: event_time(previous),
    };
    state.emergencies.insert(&event).await?;

    tracing::warn!(site_id = %site.id, ?emergency_type, "Emergency activated");
    publish(state, &event, true);

    record_with_alert(
        state,
        ActivityDraft {
            tenant_id: site.tenant_id.clone(),
            site_id: Some(site.id.clone()),
            actor_id: user.user_id.clone(),
            action: "emergency.activated",
            entity_type: "emergency",
            entity_id: event.id.clone(),
            description: format!("Emergency at {}: {}", site.name, event.message),
        },
        Severity::Critical,
        format!("Emergency: {}", type_label(emergency_type)),
    )
    .await;

    notify_staff(state, &site, &event).await;

    Ok(EmergencyStatus::from_event(&site.id, Some(&event)))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeactivateRequest {
    #[serde(default)]
    pub site_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Stand down the active emergency at a site.
pub async fn deactivate(
    state: &AppState,
    user: &AuthenticatedUser,
    request: DeactivateRequest,
) -> Result<EmergencyStatus, AppError> {
    user.require(Role::Security)?;
    ensure_active(state, user).await?;

    if request.site_id.trim().is_empty() {
        return Err(AppError::Validation(vec![FieldError::new("site_id", "is required")]));
    }

    let site = require_site(state.sites.as_ref(), user, request.site_id.trim()).await?;
    let activation = current_emergency(state.emergencies.as_ref(), &site.id)
        .await?
        .ok_or_else(|| AppError::Conflict("No emergency is active at this site".into()))?;

    let event = EmergencyEvent {
        id: new_id(),
        tenant_id: site.tenant_id.clone(),
        site_id: site.id.clone(),
        action: EmergencyAction::Deactivate,
        emergency_type: activation.emergency_type,
        message: non_blank(request.message).unwrap_or_else(|| "All clear".to_string()),
        triggered_by: user.user_id.clone(),
        created_at: event_time(Some(activation.created_at)),
    };
    state.emergencies.insert(&event).await?;

    tracing::info!(site_id = %site.id, "Emergency deactivated");
    publish(state, &event, false);

    record_activity(
        state,
        ActivityDraft {
            tenant_id: site.tenant_id.clone(),
            site_id: Some(site.id.clone()),
            actor_id: user.user_id.clone(),
            action: "emergency.deactivated",
            entity_type: "emergency",
            entity_id: event.id.clone(),
            description: format!("Emergency at {} ended: {}", site.name, event.message),
        },
    )
    .await;

    Ok(EmergencyStatus::from_event(&site.id, None))
}

pub async fn status(
    state: &AppState,
    user: &AuthenticatedUser,
    site_id: &str,
) -> Result<EmergencyStatus, AppError> {
    let site = require_site(state.sites.as_ref(), user, site_id).await?;
    let current = current_emergency(state.emergencies.as_ref(), &site.id).await?;
    Ok(EmergencyStatus::from_event(&site.id, current.as_ref()))
}

/// Everyone still checked in at a site, for evacuation.
#[derive(Debug, Serialize)]
pub struct RollCall {
    pub emergency: EmergencyStatus,
    pub count: usize,
    pub visitors: Vec<Visitor>,
}

pub async fn roll_call(
    state: &AppState,
    user: &AuthenticatedUser,
    site_id: &str,
) -> Result<RollCall, AppError> {
    let emergency = status(state, user, site_id).await?;
    let visitors = state.visitors.list_checked_in(&emergency.site_id).await?;

    Ok(RollCall {
        emergency,
        count: visitors.len(),
        visitors,
    })
}

fn publish(state: &AppState, event: &EmergencyEvent, active: bool) {
    state.hub.publish(LiveEvent::Emergency(EmergencyNotice {
        tenant_id: event.tenant_id.clone(),
        site_id: event.site_id.clone(),
        active,
        emergency_type: event.emergency_type,
        message: event.message.clone(),
        at: event.created_at,
    }));
}

fn type_label(emergency_type: EmergencyType) -> &'static str {
    match emergency_type {
        EmergencyType::Fire => "fire",
        EmergencyType::Lockdown => "lockdown",
        EmergencyType::Medical => "medical",
        EmergencyType::Evacuation => "evacuation",
        EmergencyType::Weather => "severe weather",
        EmergencyType::Other => "other",
    }
}

fn default_message(emergency_type: EmergencyType) -> String {
    format!("{} emergency declared", type_label(emergency_type))
}

/// Text every active staff member of the site (and the tenant admin) who has a phone.
async fn notify_staff(state: &AppState, site: &Site, event: &EmergencyEvent) {
    let users = match state.users.list_by_tenant(&site.tenant_id).await {
        Ok(users) => users,
        Err(e) => {
            tracing::warn!("Failed to load staff for emergency notification: {e}");
            return;
        }
    };

    let recipients = users.into_iter().filter(|u| {
        u.is_active && (u.role == Role::Admin || u.site_id.as_deref() == Some(site.id.as_str()))
    });

    for user in recipients {
        let Some(phone) = user.phone else {
            continue;
        };
        notify_best_effort(
            state.notifier.as_ref(),
            Notification {
                channel: Channel::Sms,
                to: phone,
                subject: format!("EMERGENCY at {}", site.name),
                body: event.message.clone(),
            },
        )
        .await;
    }
}
