use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::models::{AuthenticatedUser, Role};
use crate::db::models::{new_id, Incident, IncidentStatus, Severity};
use crate::error::{AppError, FieldError};
use crate::services::activity::{record_activity, record_with_alert, ActivityDraft};
use crate::services::subscription::ensure_active;
use crate::services::{clamp_limit, non_blank};
use crate::storage::client::StoredObject;
use crate::tenant::{require_site, resolve_scope};

/// Largest accepted attachment.
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateIncidentRequest {
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub visitor_id: Option<String>,
}

/// Report an incident. High and critical ones also raise an alert.
pub async fn create(
    state: &AppState,
    user: &AuthenticatedUser,
    request: CreateIncidentRequest,
) -> Result<Incident, AppError> {
    ensure_active(state, user).await?;

    let site_id = non_blank(request.site_id)
        .or_else(|| user.site_id.clone())
        .ok_or_else(|| AppError::Validation(vec![FieldError::new("site_id", "is required")]))?;
    let site = require_site(state.sites.as_ref(), user, &site_id).await?;

    let mut errors = Vec::new();
    if request.title.trim().is_empty() {
        errors.push(FieldError::new("title", "is required"));
    }
    if request.description.trim().is_empty() {
        errors.push(FieldError::new("description", "is required"));
    }
    if request.severity.is_none() {
        errors.push(FieldError::new("severity", "is required"));
    }
    AppError::check_fields(errors)?;

    let visitor_id = non_blank(request.visitor_id);
    if let Some(id) = visitor_id.as_deref() {
        let known = state
            .visitors
            .find_by_id(id)
            .await?
            .is_some_and(|v| v.site_id == site.id);
        if !known {
            return Err(AppError::Validation(vec![FieldError::new(
                "visitor_id",
                "is not a visitor of this site",
            )]));
        }
    }

    let severity = request.severity.unwrap_or(Severity::Low);
    let now = Utc::now();
    let incident = Incident {
        id: new_id(),
        tenant_id: site.tenant_id.clone(),
        site_id: site.id.clone(),
        title: request.title.trim().to_string(),
        description: request.description.trim().to_string(),
        severity,
        status: IncidentStatus::Open,
        reported_by: user.user_id.clone(),
        visitor_id,
        attachments: vec![],
        created_at: now,
        updated_at: now,
        resolved_at: None,
    };
    state.incidents.insert(&incident).await?;

    let draft = ActivityDraft {
        tenant_id: incident.tenant_id.clone(),
        site_id: Some(incident.site_id.clone()),
        actor_id: user.user_id.clone(),
        action: "incident.reported",
        entity_type: "incident",
        entity_id: incident.id.clone(),
        description: format!("Incident reported at {}: {}", site.name, incident.title),
    };
    if severity >= Severity::High {
        record_with_alert(state, draft, severity, format!("Incident: {}", incident.title)).await;
    } else {
        record_activity(state, draft).await;
    }

    Ok(incident)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncidentListParams {
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub status: Option<IncidentStatus>,
    #[serde(default)]
    pub limit: Option<i64>,
}

pub async fn list(
    state: &AppState,
    user: &AuthenticatedUser,
    params: IncidentListParams,
) -> Result<Vec<Incident>, AppError> {
    ensure_active(state, user).await?;
    let scope = resolve_scope(state.sites.as_ref(), user, params.site_id.as_deref()).await?;
    state
        .incidents
        .list(&scope, params.status, clamp_limit(params.limit))
        .await
}

pub async fn get(state: &AppState, user: &AuthenticatedUser, incident_id: &str) -> Result<Incident, AppError> {
    ensure_active(state, user).await?;
    visible_incident(state, user, incident_id).await
}

async fn visible_incident(
    state: &AppState,
    user: &AuthenticatedUser,
    incident_id: &str,
) -> Result<Incident, AppError> {
    let incident = state
        .incidents
        .find_by_id(incident_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Incident '{}' not found", incident_id)))?;
    require_site(state.sites.as_ref(), user, &incident.site_id).await?;
    Ok(incident)
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: IncidentStatus,
}

/// Move an incident along its workflow. Security staff and above.
pub async fn update_status(
    state: &AppState,
    user: &AuthenticatedUser,
    incident_id: &str,
    request: UpdateStatusRequest,
) -> Result<Incident, AppError> {
    user.require(Role::Security)?;
    ensure_active(state, user).await?;

    let incident = visible_incident(state, user, incident_id).await?;
    let (from, to) = (incident.status, request.status);
    if !from.can_transition_to(to) {
        return Err(AppError::Conflict(format!(
            "Cannot move incident from {} to {}",
            from.as_str(),
            to.as_str()
        )));
    }

    if !state.incidents.update_status(&incident.id, from, to, Utc::now()).await? {
        return Err(AppError::Conflict("Incident was modified concurrently; reload and retry".into()));
    }

    record_activity(
        state,
        ActivityDraft {
            tenant_id: incident.tenant_id.clone(),
            site_id: Some(incident.site_id.clone()),
            actor_id: user.user_id.clone(),
            action: "incident.status_changed",
            entity_type: "incident",
            entity_id: incident.id.clone(),
            description: format!("'{}' moved from {} to {}", incident.title, from.as_str(), to.as_str()),
        },
    )
    .await;

    visible_incident(state, user, incident_id).await
}

#[derive(Debug, Serialize)]
pub struct AttachmentResponse {
    pub key: String,
    pub url: String,
}

fn sanitize_file_name(file_name: &str) -> String {
    file_name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

/// Store an uploaded file under `incidents/{id}/` and link it to the incident.
pub async fn attach_file(
    state: &AppState,
    user: &AuthenticatedUser,
    incident_id: &str,
    file_name: &str,
    content_type: &str,
    content: Vec<u8>,
) -> Result<AttachmentResponse, AppError> {
    ensure_active(state, user).await?;
    let incident = visible_incident(state, user, incident_id).await?;

    if content.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".into()));
    }
    if content.len() > MAX_ATTACHMENT_BYTES {
        return Err(AppError::BadRequest(format!(
            "Attachments are limited to {} bytes",
            MAX_ATTACHMENT_BYTES
        )));
    }

    let name = format!(
        "{}_{}",
        Utc::now().timestamp_millis(),
        sanitize_file_name(file_name)
    );
    let key = format!("incidents/{}/{}", incident.id, name);

    state.storage_client.put_object(&key, content, content_type).await?;
    state.incidents.add_attachment(&incident.id, &key, Utc::now()).await?;

    record_activity(
        state,
        ActivityDraft {
            tenant_id: incident.tenant_id.clone(),
            site_id: Some(incident.site_id.clone()),
            actor_id: user.user_id.clone(),
            action: "incident.attachment_added",
            entity_type: "incident",
            entity_id: incident.id.clone(),
            description: format!("File '{}' attached to '{}'", file_name, incident.title),
        },
    )
    .await;

    Ok(AttachmentResponse {
        url: format!("/api/incidents/{}/attachments/{}", incident.id, name),
        key,
    })
}

pub async fn get_attachment(
    state: &AppState,
    user: &AuthenticatedUser,
    incident_id: &str,
    name: &str,
) -> Result<StoredObject, AppError> {
    ensure_active(state, user).await?;
    let incident = visible_incident(state, user, incident_id).await?;

    let key = format!("incidents/{}/{}", incident.id, name);
    if !incident.attachments.contains(&key) {
        return Err(AppError::NotFound("Attachment not found".into()));
    }

    state
        .storage_client
        .get_object(&key)
        .await?
        .ok_or_else(|| AppError::NotFound("Attachment not found".into()))
}
