use crate::app::AppState;
use crate::auth::middleware::build_authenticated_user;
use crate::db::models::AccessPointKind;
use crate::error::AppError;
use crate::services::accounts::{register, RegisterRequest};
use crate::services::sites::{create_access_point, create_site, CreateAccessPointRequest, CreateSiteRequest};
use crate::services::subscription::start_trial;

pub const DEMO_ADMIN_EMAIL: &str = "admin@demo.acsoguard.local";
pub const DEMO_ADMIN_PASSWORD: &str = "demo-password";

/// Create a demo tenant (admin, trial, one site with a reception desk).
///
/// Skips everything when the demo admin already exists, so it is safe to run
/// on every start.
pub async fn seed_demo_data(state: &AppState) -> Result<(), AppError> {
    if state.users.find_by_email(DEMO_ADMIN_EMAIL).await?.is_some() {
        tracing::info!("Demo tenant already exists, skipping.");
        return Ok(());
    }

    tracing::info!("Starting demo data seeding...");

    let registered = register(
        state,
        RegisterRequest {
            name: "Demo Admin".into(),
            email: DEMO_ADMIN_EMAIL.into(),
            password: DEMO_ADMIN_PASSWORD.into(),
            phone: None,
        },
    )
    .await?;

    let admin = state
        .users
        .find_by_id(&registered.user.id)
        .await?
        .ok_or_else(|| AppError::Internal("Demo admin vanished after insert".into()))?;
    let admin = build_authenticated_user(&admin);

    start_trial(state, &admin).await?;

    let site = create_site(
        state,
        &admin,
        CreateSiteRequest {
            name: "Demo Headquarters".into(),
            address: "1 Example Street".into(),
            timezone: None,
        },
    )
    .await?;

    create_access_point(
        state,
        &admin,
        &site.id,
        CreateAccessPointRequest {
            name: "Main Reception".into(),
            kind: Some(AccessPointKind::Reception),
        },
    )
    .await?;

    tracing::info!(
        tenant_id = %admin.tenant_id,
        "Demo tenant seeded; log in as {}",
        DEMO_ADMIN_EMAIL
    );
    Ok(())
}
