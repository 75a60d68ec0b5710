use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::models::{AuthenticatedUser, Role};
use crate::db::banned_repository::BannedVisitorRepository;
use crate::db::models::{new_id, BannedVisitor};
use crate::error::{AppError, FieldError};
use crate::services::activity::{record_activity, ActivityDraft};
use crate::services::{looks_like_email, non_blank};
use crate::services::subscription::ensure_active;
use crate::tenant::{require_site, resolve_scope};

/// The identity presented at a check-in, compared against the ban list.
#[derive(Debug, Clone)]
pub struct BanCandidate {
    pub tenant_id: String,
    pub site_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone_digits: Option<String>,
}

impl BanCandidate {
    pub fn new(
        tenant_id: &str,
        site_id: &str,
        first_name: &str,
        last_name: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            site_id: site_id.to_string(),
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            email: email
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
            phone_digits: phone.and_then(normalize_phone),
        }
    }

    /// Exact check of one ban against this candidate.
    ///
    /// A ban applies when it is active, belongs to the same tenant, is either
    /// tenant-wide or for this site, and matches on full name, email or phone.
    pub fn matches(&self, ban: &BannedVisitor) -> bool {
        if !ban.is_active || ban.tenant_id != self.tenant_id {
            return false;
        }
        if ban.site_id.as_deref().is_some_and(|site| site != self.site_id) {
            return false;
        }

        let same_name = eq_ci(&ban.first_name, &self.first_name) && eq_ci(&ban.last_name, &self.last_name);
        let same_email = match (&ban.email, &self.email) {
            (Some(banned), Some(given)) => eq_ci(banned, given),
            _ => false,
        };
        let same_phone = match (&ban.phone_digits, &self.phone_digits) {
            (Some(banned), Some(given)) => banned == given,
            _ => false,
        };

        same_name || same_email || same_phone
    }
}

fn eq_ci(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Reduce a phone number to its digits. `None` when nothing is left.
pub fn normalize_phone(phone: &str) -> Option<String> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Anchored, escaped pattern for an exact case-insensitive `$regex` match.
pub fn anchored_pattern(value: &str) -> String {
    format!("^{}$", regex::escape(value.trim()))
}

/// The first active ban matching `candidate`, if any.
pub async fn find_ban(
    bans: &dyn BannedVisitorRepository,
    candidate: &BanCandidate,
) -> Result<Option<BannedVisitor>, AppError> {
    Ok(matching_bans(bans, candidate).await?.into_iter().next())
}

async fn matching_bans(
    bans: &dyn BannedVisitorRepository,
    candidate: &BanCandidate,
) -> Result<Vec<BannedVisitor>, AppError> {
    let hits = bans.find_candidates(candidate).await?;
    Ok(hits.into_iter().filter(|ban| candidate.matches(ban)).collect())
}

/// Body of `POST /api/banned`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBanRequest {
    /// Omitted: tenant-wide for admins, the assigned site for staff.
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub reason: String,
}

/// Add a person to the ban list.
pub async fn create_ban(
    state: &AppState,
    user: &AuthenticatedUser,
    request: CreateBanRequest,
) -> Result<BannedVisitor, AppError> {
    user.require(Role::Security)?;
    ensure_active(state, user).await?;

    let email = non_blank(request.email);
    let mut errors = Vec::new();
    if request.first_name.trim().is_empty() {
        errors.push(FieldError::new("first_name", "is required"));
    }
    if request.last_name.trim().is_empty() {
        errors.push(FieldError::new("last_name", "is required"));
    }
    if request.reason.trim().is_empty() {
        errors.push(FieldError::new("reason", "is required"));
    }
    if email.as_deref().is_some_and(|e| !looks_like_email(e)) {
        errors.push(FieldError::new("email", "is not a valid email address"));
    }
    AppError::check_fields(errors)?;

    let site_id = match non_blank(request.site_id) {
        Some(site_id) => Some(site_id),
        None if user.role.is_staff() => user.site_id.clone(),
        None => None,
    };

    let tenant_id = match site_id.as_deref() {
        Some(site_id) => require_site(state.sites.as_ref(), user, site_id).await?.tenant_id,
        None => user.tenant_id.clone(),
    };

    let ban = BannedVisitor {
        id: new_id(),
        tenant_id,
        site_id,
        first_name: request.first_name.trim().to_string(),
        last_name: request.last_name.trim().to_string(),
        email,
        phone_digits: request.phone.as_deref().and_then(normalize_phone),
        reason: request.reason.trim().to_string(),
        banned_by: user.user_id.clone(),
        is_active: true,
        created_at: Utc::now(),
    };

    state.bans.insert(&ban).await?;

    record_activity(
        state,
        ActivityDraft {
            tenant_id: ban.tenant_id.clone(),
            site_id: ban.site_id.clone(),
            actor_id: user.user_id.clone(),
            action: "banned.created",
            entity_type: "banned_visitor",
            entity_id: ban.id.clone(),
            description: format!("{} {} banned: {}", ban.first_name, ban.last_name, ban.reason),
        },
    )
    .await;

    Ok(ban)
}

/// Active bans in the caller's scope.
pub async fn list_bans(
    state: &AppState,
    user: &AuthenticatedUser,
    site_id: Option<&str>,
) -> Result<Vec<BannedVisitor>, AppError> {
    ensure_active(state, user).await?;
    let scope = resolve_scope(state.sites.as_ref(), user, site_id).await?;
    state.bans.list_active(&scope).await
}

/// Lift a ban (soft delete).
pub async fn deactivate_ban(
    state: &AppState,
    user: &AuthenticatedUser,
    ban_id: &str,
) -> Result<(), AppError> {
    user.require(Role::Admin)?;
    ensure_active(state, user).await?;

    let ban = state
        .bans
        .find_by_id(ban_id)
        .await?
        .filter(|b| b.is_active)
        .ok_or_else(|| AppError::NotFound(format!("Ban '{}' not found", ban_id)))?;

    let scope = resolve_scope(state.sites.as_ref(), user, None).await?;
    if !scope.admits(&ban.tenant_id, ban.site_id.as_deref()) {
        return Err(AppError::Forbidden("Ban is outside this account's scope".into()));
    }

    if !state.bans.deactivate(ban_id).await? {
        return Err(AppError::NotFound(format!("Ban '{}' not found", ban_id)));
    }

    record_activity(
        state,
        ActivityDraft {
            tenant_id: ban.tenant_id.clone(),
            site_id: ban.site_id.clone(),
            actor_id: user.user_id.clone(),
            action: "banned.removed",
            entity_type: "banned_visitor",
            entity_id: ban.id.clone(),
            description: format!("Ban on {} {} lifted", ban.first_name, ban.last_name),
        },
    )
    .await;

    Ok(())
}

/// Body of `POST /api/banned/check`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BanCheckRequest {
    #[serde(default)]
    pub site_id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BanCheckResponse {
    pub banned: bool,
    pub matches: Vec<BannedVisitor>,
}

/// Dry-run match, used by the reception desk before filling a check-in.
pub async fn check(
    state: &AppState,
    user: &AuthenticatedUser,
    request: BanCheckRequest,
) -> Result<BanCheckResponse, AppError> {
    ensure_active(state, user).await?;

    let mut errors = Vec::new();
    if request.site_id.trim().is_empty() {
        errors.push(FieldError::new("site_id", "is required"));
    }
    if request.first_name.trim().is_empty() {
        errors.push(FieldError::new("first_name", "is required"));
    }
    if request.last_name.trim().is_empty() {
        errors.push(FieldError::new("last_name", "is required"));
    }
    AppError::check_fields(errors)?;

    let site = require_site(state.sites.as_ref(), user, request.site_id.trim()).await?;
    let candidate = BanCandidate::new(
        &site.tenant_id,
        &site.id,
        &request.first_name,
        &request.last_name,
        request.email.as_deref(),
        request.phone.as_deref(),
    );

    let matches = matching_bans(state.bans.as_ref(), &candidate).await?;
    Ok(BanCheckResponse {
        banned: !matches.is_empty(),
        matches,
    })
}
