use chrono::Utc;
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::models::{AuthenticatedUser, Role};
use crate::db::models::{new_id, AccessPoint, AccessPointKind, Site};
use crate::error::{AppError, FieldError};
use crate::services::activity::{record_activity, ActivityDraft};
use crate::services::non_blank;
use crate::services::subscription::{ensure_active, ensure_site_capacity};
use crate::tenant::{require_site, resolve_scope};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSiteRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub timezone: Option<String>,
}

pub async fn create_site(
    state: &AppState,
    user: &AuthenticatedUser,
    request: CreateSiteRequest,
) -> Result<Site, AppError> {
    user.require(Role::Admin)?;

    ensure_site_capacity(state, user).await?;

    if request.name.trim().is_empty() {
        return Err(AppError::Validation(vec![FieldError::new("name", "is required")]));
    }

    let site = Site {
        id: new_id(),
        tenant_id: user.tenant_id.clone(),
        name: request.name.trim().to_string(),
        address: request.address.trim().to_string(),
        timezone: non_blank(request.timezone).unwrap_or_else(|| "UTC".to_string()),
        is_active: true,
        created_at: Utc::now(),
    };
    state.sites.insert_site(&site).await?;

    record_activity(
        state,
        ActivityDraft {
            tenant_id: site.tenant_id.clone(),
            site_id: Some(site.id.clone()),
            actor_id: user.user_id.clone(),
            action: "site.created",
            entity_type: "site",
            entity_id: site.id.clone(),
            description: format!("Site '{}' created", site.name),
        },
    )
    .await;

    Ok(site)
}

pub async fn list_sites(state: &AppState, user: &AuthenticatedUser) -> Result<Vec<Site>, AppError> {
    let scope = resolve_scope(state.sites.as_ref(), user, None).await?;
    state.sites.list_sites(&scope).await
}

pub async fn get_site(state: &AppState, user: &AuthenticatedUser, site_id: &str) -> Result<Site, AppError> {
    require_site(state.sites.as_ref(), user, site_id).await
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateAccessPointRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: Option<AccessPointKind>,
}

pub async fn create_access_point(
    state: &AppState,
    user: &AuthenticatedUser,
    site_id: &str,
    request: CreateAccessPointRequest,
) -> Result<AccessPoint, AppError> {
    user.require(Role::Admin)?;
    ensure_active(state, user).await?;
    let site = require_site(state.sites.as_ref(), user, site_id).await?;

    let mut errors = Vec::new();
    if request.name.trim().is_empty() {
        errors.push(FieldError::new("name", "is required"));
    }
    if request.kind.is_none() {
        errors.push(FieldError::new("kind", "is required"));
    }
    AppError::check_fields(errors)?;

    let access_point = AccessPoint {
        id: new_id(),
        tenant_id: site.tenant_id.clone(),
        site_id: site.id.clone(),
        name: request.name.trim().to_string(),
        kind: request.kind.unwrap_or(AccessPointKind::Entrance),
        is_active: true,
        created_at: Utc::now(),
    };
    state.sites.insert_access_point(&access_point).await?;

    record_activity(
        state,
        ActivityDraft {
            tenant_id: site.tenant_id,
            site_id: Some(site.id),
            actor_id: user.user_id.clone(),
            action: "access_point.created",
            entity_type: "access_point",
            entity_id: access_point.id.clone(),
            description: format!("Access point '{}' added", access_point.name),
        },
    )
    .await;

    Ok(access_point)
}

pub async fn list_access_points(
    state: &AppState,
    user: &AuthenticatedUser,
    site_id: &str,
) -> Result<Vec<AccessPoint>, AppError> {
    let site = require_site(state.sites.as_ref(), user, site_id).await?;
    state.sites.list_access_points(&site.id).await
}

/// Soft-delete an access point of `site_id`.
pub async fn deactivate_access_point(
    state: &AppState,
    user: &AuthenticatedUser,
    site_id: &str,
    access_point_id: &str,
) -> Result<(), AppError> {
    user.require(Role::Admin)?;
    let site = require_site(state.sites.as_ref(), user, site_id).await?;

    let not_found = || AppError::NotFound(format!("Access point '{}' not found", access_point_id));

    let access_point = state
        .sites
        .find_access_point(access_point_id)
        .await?
        .filter(|ap| ap.site_id == site.id)
        .ok_or_else(not_found)?;

    if !state.sites.deactivate_access_point(&access_point.id).await? {
        return Err(not_found());
    }

    record_activity(
        state,
        ActivityDraft {
            tenant_id: site.tenant_id,
            site_id: Some(site.id),
            actor_id: user.user_id.clone(),
            action: "access_point.removed",
            entity_type: "access_point",
            entity_id: access_point.id,
            description: format!("Access point '{}' removed", access_point.name),
        },
    )
    .await;

    Ok(())
}
