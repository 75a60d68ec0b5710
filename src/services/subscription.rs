use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::models::{AuthenticatedUser, Role};
use crate::db::models::{new_id, Plan, Subscription, SubscriptionStatus};
use crate::error::{AppError, FieldError};
use crate::services::activity::{record_activity, ActivityDraft};

/// Length of the free trial.
pub const TRIAL_DAYS: i64 = 14;

const SUBSCRIPTION_REQUIRED: &str = "Active subscription required";

/// Gate for paid features. Super admins always pass.
pub async fn ensure_active(state: &AppState, user: &AuthenticatedUser) -> Result<(), AppError> {
    if user.is_super_admin() {
        return Ok(());
    }
    usable_subscription(state, &user.tenant_id).await.map(|_| ())
}

async fn usable_subscription(state: &AppState, tenant_id: &str) -> Result<Subscription, AppError> {
    match state.subscriptions.find_by_tenant(tenant_id).await? {
        Some(sub) if sub.is_usable_at(Utc::now()) => Ok(sub),
        _ => Err(AppError::PaymentRequired(SUBSCRIPTION_REQUIRED.into())),
    }
}

/// Check the tenant may add one more active site under its plan.
pub async fn ensure_site_capacity(state: &AppState, user: &AuthenticatedUser) -> Result<(), AppError> {
    let plan = if user.is_super_admin() {
        match state.subscriptions.find_by_tenant(&user.tenant_id).await? {
            Some(sub) => sub.plan,
            None => return Ok(()),
        }
    } else {
        usable_subscription(state, &user.tenant_id).await?.plan
    };

    let Some(max_sites) = plan.max_sites() else {
        return Ok(());
    };

    let active = state.sites.count_active_sites(&user.tenant_id).await?;
    if active >= max_sites as u64 {
        return Err(AppError::PaymentRequired(format!(
            "The {} plan allows at most {} site(s); upgrade to add more",
            plan_name(plan),
            max_sites
        )));
    }
    Ok(())
}

fn plan_name(plan: Plan) -> &'static str {
    match plan {
        Plan::Basic => "basic",
        Plan::Professional => "professional",
        Plan::Enterprise => "enterprise",
    }
}

/// Response of `GET /api/subscriptions/me`.
#[derive(Debug, Serialize)]
pub struct SubscriptionOverview {
    pub subscription: Option<Subscription>,
    pub is_usable: bool,
    pub active_sites: u64,
    /// `null` when unlimited.
    pub max_sites: Option<usize>,
}

pub async fn get_mine(state: &AppState, user: &AuthenticatedUser) -> Result<SubscriptionOverview, AppError> {
    let subscription = state.subscriptions.find_by_tenant(&user.tenant_id).await?;
    let active_sites = state.sites.count_active_sites(&user.tenant_id).await?;

    Ok(SubscriptionOverview {
        is_usable: subscription
            .as_ref()
            .is_some_and(|s| s.is_usable_at(Utc::now())),
        max_sites: subscription.as_ref().and_then(|s| s.plan.max_sites()),
        subscription,
        active_sites,
    })
}

/// Start the one-time professional trial for the caller's tenant.
pub async fn start_trial(state: &AppState, user: &AuthenticatedUser) -> Result<Subscription, AppError> {
    user.require(Role::Admin)?;

    if state.subscriptions.find_by_tenant(&user.tenant_id).await?.is_some() {
        return Err(AppError::Conflict("This account already has a subscription".into()));
    }

    let now = Utc::now();
    let subscription = Subscription {
        id: new_id(),
        tenant_id: user.tenant_id.clone(),
        plan: Plan::Professional,
        status: SubscriptionStatus::Trialing,
        current_period_end: now + Duration::days(TRIAL_DAYS),
        stripe_customer_id: None,
        created_at: now,
        updated_at: now,
    };
    state.subscriptions.insert(&subscription).await?;

    log_change(state, user, &subscription, "subscription.trial_started", "Trial started".into()).await;
    tracing::info!(tenant_id = %user.tenant_id, "Trial subscription started");

    Ok(subscription)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePlanRequest {
    pub plan: Plan,
}

/// Switch plans. Downgrades must fit the tenant's active sites.
pub async fn change_plan(
    state: &AppState,
    user: &AuthenticatedUser,
    request: ChangePlanRequest,
) -> Result<Subscription, AppError> {
    user.require(Role::Admin)?;
    let mut subscription = usable_subscription(state, &user.tenant_id).await?;

    if let Some(max_sites) = request.plan.max_sites() {
        let active = state.sites.count_active_sites(&user.tenant_id).await?;
        if active > max_sites as u64 {
            return Err(AppError::Conflict(format!(
                "{} active sites exceed the {} plan limit of {}",
                active,
                plan_name(request.plan),
                max_sites
            )));
        }
    }

    let previous = subscription.plan;
    subscription.plan = request.plan;
    subscription.updated_at = Utc::now();
    state.subscriptions.update(&subscription).await?;

    log_change(
        state,
        user,
        &subscription,
        "subscription.plan_changed",
        format!("Plan changed from {} to {}", plan_name(previous), plan_name(request.plan)),
    )
    .await;

    Ok(subscription)
}

/// Cancel immediately; gated features stop working.
pub async fn cancel(state: &AppState, user: &AuthenticatedUser) -> Result<Subscription, AppError> {
    user.require(Role::Admin)?;

    let mut subscription = state
        .subscriptions
        .find_by_tenant(&user.tenant_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No subscription for this account".into()))?;

    if subscription.status == SubscriptionStatus::Canceled {
        return Err(AppError::Conflict("Subscription is already canceled".into()));
    }

    subscription.status = SubscriptionStatus::Canceled;
    subscription.updated_at = Utc::now();
    state.subscriptions.update(&subscription).await?;

    log_change(state, user, &subscription, "subscription.canceled", "Subscription canceled".into()).await;

    Ok(subscription)
}

/// Body of `PUT /api/subscriptions/{tenant_id}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct SetStatusRequest {
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub plan: Option<Plan>,
    /// Unix milliseconds.
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

/// Manual billing override for platform operators.
pub async fn set_status(
    state: &AppState,
    user: &AuthenticatedUser,
    tenant_id: &str,
    request: SetStatusRequest,
) -> Result<Subscription, AppError> {
    user.require(Role::SuperAdmin)?;

    let period_end = match request.current_period_end {
        None => None,
        Some(ms) => Some(DateTime::from_timestamp_millis(ms).ok_or_else(|| {
            AppError::Validation(vec![FieldError::new(
                "current_period_end",
                "is not a valid timestamp",
            )])
        })?),
    };

    let mut subscription = state
        .subscriptions
        .find_by_tenant(tenant_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No subscription for tenant '{}'", tenant_id)))?;

    subscription.status = request.status;
    if let Some(plan) = request.plan {
        subscription.plan = plan;
    }
    if let Some(period_end) = period_end {
        subscription.current_period_end = period_end;
    }
    subscription.updated_at = Utc::now();
    state.subscriptions.update(&subscription).await?;

    log_change(
        state,
        user,
        &subscription,
        "subscription.status_set",
        format!("Subscription status set to {:?}", request.status),
    )
    .await;

    Ok(subscription)
}

async fn log_change(
    state: &AppState,
    user: &AuthenticatedUser,
    subscription: &Subscription,
    action: &'static str,
    description: String,
) {
    record_activity(
        state,
        ActivityDraft {
            tenant_id: subscription.tenant_id.clone(),
            site_id: None,
            actor_id: user.user_id.clone(),
            action,
            entity_type: "subscription",
            entity_id: subscription.id.clone(),
            description,
        },
    )
    .await;
}
