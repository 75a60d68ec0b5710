use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::models::{AuthenticatedUser, Role};
use crate::auth::password::{hash_password, verify_password};
use crate::db::models::{new_id, User, UserProfile};
use crate::error::{AppError, FieldError};
use crate::services::activity::{record_activity, ActivityDraft};
use crate::services::{looks_like_email, non_blank};
use crate::tenant::require_site;

pub const MIN_PASSWORD_LENGTH: usize = 8;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Token plus the account it was issued for.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
}

fn validate_identity(name: &str, email: &str, password: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if name.trim().is_empty() {
        errors.push(FieldError::new("name", "is required"));
    }
    if !looks_like_email(email.trim()) {
        errors.push(FieldError::new("email", "is not a valid email address"));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(FieldError::new(
            "password",
            format!("must be at least {} characters", MIN_PASSWORD_LENGTH),
        ));
    }
    errors
}

async fn ensure_email_free(state: &AppState, email: &str) -> Result<(), AppError> {
    if state.users.find_by_email(email).await?.is_some() {
        return Err(AppError::Conflict("An account with this email already exists".into()));
    }
    Ok(())
}

/// Sign up a new tenant. The admin's own id becomes the tenant id.
pub async fn register(state: &AppState, request: RegisterRequest) -> Result<AuthResponse, AppError> {
    AppError::check_fields(validate_identity(&request.name, &request.email, &request.password))?;

    let email = request.email.trim().to_lowercase();
    ensure_email_free(state, &email).await?;

    let id = new_id();
    let user = User {
        id: id.clone(),
        email,
        password_hash: hash_password(&request.password).await?,
        name: request.name.trim().to_string(),
        phone: non_blank(request.phone),
        role: Role::Admin,
        tenant_id: id,
        site_id: None,
        is_active: true,
        created_at: Utc::now(),
    };
    state.users.insert(&user).await?;

    tracing::info!(tenant_id = %user.tenant_id, "New tenant registered");

    Ok(AuthResponse {
        token: state.jwt.issue(&user)?,
        user: UserProfile::from(&user),
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Exchange credentials for a token. Every failure looks the same to the caller.
pub async fn login(state: &AppState, request: LoginRequest) -> Result<AuthResponse, AppError> {
    let email = request.email.trim().to_lowercase();
    let invalid = || AppError::Auth(INVALID_CREDENTIALS.into());

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(invalid)?;

    if !verify_password(&request.password, &user.password_hash).await {
        tracing::debug!(user_id = %user.id, "Rejected login: wrong password");
        return Err(invalid());
    }

    Ok(AuthResponse {
        token: state.jwt.issue(&user)?,
        user: UserProfile::from(&user),
    })
}

pub async fn me(state: &AppState, user: &AuthenticatedUser) -> Result<UserProfile, AppError> {
    state
        .users
        .find_by_id(&user.user_id)
        .await?
        .map(|u| UserProfile::from(&u))
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateStaffRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub site_id: String,
}

/// Create a security or reception account bound to one of the admin's sites.
pub async fn create_staff(
    state: &AppState,
    user: &AuthenticatedUser,
    request: CreateStaffRequest,
) -> Result<UserProfile, AppError> {
    user.require(Role::Admin)?;

    let mut errors = validate_identity(&request.name, &request.email, &request.password);
    if !request.role.is_some_and(|r| r.is_staff()) {
        errors.push(FieldError::new("role", "must be security or receptionist"));
    }
    if request.site_id.trim().is_empty() {
        errors.push(FieldError::new("site_id", "is required"));
    }
    AppError::check_fields(errors)?;

    let site = require_site(state.sites.as_ref(), user, request.site_id.trim()).await?;

    let email = request.email.trim().to_lowercase();
    ensure_email_free(state, &email).await?;

    let staff = User {
        id: new_id(),
        email,
        password_hash: hash_password(&request.password).await?,
        name: request.name.trim().to_string(),
        phone: non_blank(request.phone),
        role: request.role.unwrap_or(Role::Receptionist),
        tenant_id: site.tenant_id.clone(),
        site_id: Some(site.id.clone()),
        is_active: true,
        created_at: Utc::now(),
    };
    state.users.insert(&staff).await?;

    record_activity(
        state,
        ActivityDraft {
            tenant_id: staff.tenant_id.clone(),
            site_id: staff.site_id.clone(),
            actor_id: user.user_id.clone(),
            action: "user.staff_created",
            entity_type: "user",
            entity_id: staff.id.clone(),
            description: format!("{} added as {} at {}", staff.name, staff.role, site.name),
        },
    )
    .await;

    Ok(UserProfile::from(&staff))
}

/// Staff accounts of the caller's tenant.
pub async fn list_staff(state: &AppState, user: &AuthenticatedUser) -> Result<Vec<UserProfile>, AppError> {
    user.require(Role::Admin)?;
    let users = state.users.list_by_tenant(&user.tenant_id).await?;
    Ok(users
        .iter()
        .filter(|u| u.role.is_staff())
        .map(UserProfile::from)
        .collect())
}
