use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::models::AuthenticatedUser;
use crate::db::models::{new_id, Severity, Site, Visitor, VisitorStatus};
use crate::db::visitor_repository::VisitorQuery;
use crate::error::{AppError, FieldError};
use crate::notify::{notify_best_effort, Channel, Notification};
use crate::realtime::hub::{LiveEvent, VisitorNotice};
use crate::services::activity::{record_activity, record_with_alert, ActivityDraft};
use crate::services::badge::{decode_qr_payload, encode_qr_payload, insert_with_free_badge, BadgePayload};
use crate::services::banned::{find_ban, normalize_phone, BanCandidate};
use crate::services::emergency::is_active;
use crate::services::subscription::ensure_active;
use crate::services::{clamp_limit, looks_like_email, non_blank};
use crate::tenant::{require_site, resolve_scope};

/// Body of `POST /api/visitors/check-in`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckInRequest {
    /// Staff may omit it; their assigned site is used.
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub access_point_id: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub host_name: String,
    /// Where to send the arrival notice.
    #[serde(default)]
    pub host_email: Option<String>,
    #[serde(default)]
    pub purpose: String,
}

#[derive(Debug, Serialize)]
pub struct CheckInResponse {
    pub visitor: Visitor,
    /// Content of the badge QR code.
    pub qr_payload: String,
}

fn validate(request: &CheckInRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if request.first_name.trim().is_empty() {
        errors.push(FieldError::new("first_name", "is required"));
    }
    if request.last_name.trim().is_empty() {
        errors.push(FieldError::new("last_name", "is required"));
    }
    if request.host_name.trim().is_empty() {
        errors.push(FieldError::new("host_name", "is required"));
    }
    if request.purpose.trim().is_empty() {
        errors.push(FieldError::new("purpose", "is required"));
    }
    if let Some(email) = request.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        if !looks_like_email(email) {
            errors.push(FieldError::new("email", "is not a valid email address"));
        }
    }
    if let Some(email) = request.host_email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        if !looks_like_email(email) {
            errors.push(FieldError::new("host_email", "is not a valid email address"));
        }
    }
    if let Some(phone) = request.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        if normalize_phone(phone).is_none() {
            errors.push(FieldError::new("phone", "must contain digits"));
        }
    }
    errors
}

/// Admit a visitor to a site.
///
/// Checks run in order: subscription, site scope, fields, access point,
/// emergency lockout, ban list. Only then is a badge allocated.
pub async fn check_in(
    state: &AppState,
    user: &AuthenticatedUser,
    request: CheckInRequest,
) -> Result<CheckInResponse, AppError> {
    ensure_active(state, user).await?;

    let site_id = non_blank(request.site_id.clone())
        .or_else(|| user.site_id.clone())
        .ok_or_else(|| AppError::Validation(vec![FieldError::new("site_id", "is required")]))?;
    let site = require_site(state.sites.as_ref(), user, &site_id).await?;

    AppError::check_fields(validate(&request))?;

    let access_point_id = non_blank(request.access_point_id.clone());
    if let Some(ap_id) = access_point_id.as_deref() {
        let usable = state
            .sites
            .find_access_point(ap_id)
            .await?
            .is_some_and(|ap| ap.site_id == site.id && ap.is_active);
        if !usable {
            return Err(AppError::Validation(vec![FieldError::new(
                "access_point_id",
                "is not an active access point of this site",
            )]));
        }
    }

    if is_active(state.emergencies.as_ref(), &site.id).await? {
        return Err(AppError::Conflict(
            "Check-in is suspended while an emergency is active at this site".into(),
        ));
    }

    let candidate = BanCandidate::new(
        &site.tenant_id,
        &site.id,
        &request.first_name,
        &request.last_name,
        request.email.as_deref(),
        request.phone.as_deref(),
    );
    if let Some(ban) = find_ban(state.bans.as_ref(), &candidate).await? {
        deny_entry(state, user, &site, &candidate, &ban.id).await;
        return Err(AppError::Forbidden("Visitor is on the banned list".into()));
    }

    let mut visitor = Visitor {
        id: new_id(),
        tenant_id: site.tenant_id.clone(),
        site_id: site.id.clone(),
        access_point_id,
        first_name: candidate.first_name.clone(),
        last_name: candidate.last_name.clone(),
        email: candidate.email.clone(),
        phone: non_blank(request.phone),
        company_name: non_blank(request.company_name),
        host_name: request.host_name.trim().to_string(),
        purpose: request.purpose.trim().to_string(),
        badge_number: String::new(),
        status: VisitorStatus::CheckedIn,
        check_in_at: Utc::now(),
        check_out_at: None,
        checked_in_by: user.user_id.clone(),
    };
    insert_with_free_badge(state.visitors.as_ref(), &mut visitor).await?;

    let qr_payload = encode_qr_payload(&BadgePayload::from(&visitor))?;

    record_activity(
        state,
        ActivityDraft {
            tenant_id: visitor.tenant_id.clone(),
            site_id: Some(visitor.site_id.clone()),
            actor_id: user.user_id.clone(),
            action: "visitor.checked_in",
            entity_type: "visitor",
            entity_id: visitor.id.clone(),
            description: format!(
                "{} checked in at {} to see {}",
                visitor.full_name(),
                site.name,
                visitor.host_name
            ),
        },
    )
    .await;
    state.hub.publish(LiveEvent::Visitor(VisitorNotice::from(&visitor)));

    if let Some(host_email) = non_blank(request.host_email) {
        notify_best_effort(
            state.notifier.as_ref(),
            Notification {
                channel: Channel::Email,
                to: host_email,
                subject: format!("{} has arrived", visitor.full_name()),
                body: format!(
                    "{} is waiting for you at {} (badge {}). Purpose: {}",
                    visitor.full_name(),
                    site.name,
                    visitor.badge_number,
                    visitor.purpose
                ),
            },
        )
        .await;
    }

    tracing::info!(visitor_id = %visitor.id, site_id = %site.id, "Visitor checked in");
    Ok(CheckInResponse { visitor, qr_payload })
}

async fn deny_entry(
    state: &AppState,
    user: &AuthenticatedUser,
    site: &Site,
    candidate: &BanCandidate,
    ban_id: &str,
) {
    tracing::warn!(site_id = %site.id, ban_id, "Banned visitor refused at check-in");

    record_with_alert(
        state,
        ActivityDraft {
            tenant_id: site.tenant_id.clone(),
            site_id: Some(site.id.clone()),
            actor_id: user.user_id.clone(),
            action: "visitor.denied",
            entity_type: "banned_visitor",
            entity_id: ban_id.to_string(),
            description: format!(
                "{} {} was refused entry at {}",
                candidate.first_name, candidate.last_name, site.name
            ),
        },
        Severity::High,
        "Banned visitor attempted entry".to_string(),
    )
    .await;
}

/// Load a visitor and check the caller may see its site.
async fn visible_visitor(
    state: &AppState,
    user: &AuthenticatedUser,
    visitor_id: &str,
) -> Result<Visitor, AppError> {
    let visitor = state
        .visitors
        .find_by_id(visitor_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Visitor '{}' not found", visitor_id)))?;
    require_site(state.sites.as_ref(), user, &visitor.site_id).await?;
    Ok(visitor)
}

pub async fn check_out(
    state: &AppState,
    user: &AuthenticatedUser,
    visitor_id: &str,
) -> Result<Visitor, AppError> {
    ensure_active(state, user).await?;
    let visitor = visible_visitor(state, user, visitor_id).await?;
    finish_visit(state, user, visitor).await
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BadgeCheckOutRequest {
    #[serde(default)]
    pub qr: String,
}

/// Check out by scanning the badge QR code.
pub async fn check_out_by_badge(
    state: &AppState,
    user: &AuthenticatedUser,
    request: BadgeCheckOutRequest,
) -> Result<Visitor, AppError> {
    ensure_active(state, user).await?;

    if request.qr.trim().is_empty() {
        return Err(AppError::Validation(vec![FieldError::new("qr", "is required")]));
    }
    let payload = decode_qr_payload(&request.qr)?;

    let visitor = visible_visitor(state, user, &payload.visitor_id).await?;
    if visitor.badge_number != payload.badge || visitor.site_id != payload.site_id {
        return Err(AppError::NotFound("No visitor holds this badge".into()));
    }

    finish_visit(state, user, visitor).await
}

async fn finish_visit(
    state: &AppState,
    user: &AuthenticatedUser,
    mut visitor: Visitor,
) -> Result<Visitor, AppError> {
    let already_out = || AppError::Conflict("Visitor is already checked out".into());
    if visitor.status != VisitorStatus::CheckedIn {
        return Err(already_out());
    }

    let now = Utc::now();
    if !state.visitors.check_out(&visitor.id, now).await? {
        return Err(already_out());
    }
    visitor.status = VisitorStatus::CheckedOut;
    visitor.check_out_at = Some(now);

    record_activity(
        state,
        ActivityDraft {
            tenant_id: visitor.tenant_id.clone(),
            site_id: Some(visitor.site_id.clone()),
            actor_id: user.user_id.clone(),
            action: "visitor.checked_out",
            entity_type: "visitor",
            entity_id: visitor.id.clone(),
            description: format!("{} checked out", visitor.full_name()),
        },
    )
    .await;
    state.hub.publish(LiveEvent::Visitor(VisitorNotice::from(&visitor)));

    Ok(visitor)
}

/// Query string of `GET /api/visitors`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VisitorListParams {
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub status: Option<VisitorStatus>,
    #[serde(default)]
    pub limit: Option<i64>,
}

pub async fn list(
    state: &AppState,
    user: &AuthenticatedUser,
    params: VisitorListParams,
) -> Result<Vec<Visitor>, AppError> {
    ensure_active(state, user).await?;
    let scope = resolve_scope(state.sites.as_ref(), user, params.site_id.as_deref()).await?;
    let query = VisitorQuery {
        status: params.status,
        limit: clamp_limit(params.limit),
    };
    state.visitors.list(&scope, &query).await
}

pub async fn get(state: &AppState, user: &AuthenticatedUser, visitor_id: &str) -> Result<Visitor, AppError> {
    ensure_active(state, user).await?;
    visible_visitor(state, user, visitor_id).await
}
