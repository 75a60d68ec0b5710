use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::auth::jwt::JwtKeys;
use crate::db::activity_repository::{ActivityRepository, MongoActivityRepository};
use crate::db::banned_repository::{BannedVisitorRepository, MongoBannedVisitorRepository};
use crate::db::emergency_repository::{EmergencyRepository, MongoEmergencyRepository};
use crate::db::incident_repository::{IncidentRepository, MongoIncidentRepository};
use crate::db::site_repository::{MongoSiteRepository, SiteRepository};
use crate::db::subscription_repository::{MongoSubscriptionRepository, SubscriptionRepository};
use crate::db::user_repository::{MongoUserRepository, UserRepository};
use crate::db::visitor_repository::{MongoVisitorRepository, VisitorRepository};
use crate::notify::Notifier;
use crate::realtime::hub::LiveHub;
use crate::realtime::socket::live_handler;
use crate::services::incidents::MAX_ATTACHMENT_BYTES;
use crate::storage::client::StorageClient;

/// Shared application state passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub sites: Arc<dyn SiteRepository>,
    pub visitors: Arc<dyn VisitorRepository>,
    pub bans: Arc<dyn BannedVisitorRepository>,
    pub incidents: Arc<dyn IncidentRepository>,
    pub emergencies: Arc<dyn EmergencyRepository>,
    pub activities: Arc<dyn ActivityRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub storage_client: Arc<dyn StorageClient>,
    pub notifier: Arc<dyn Notifier>,
    pub hub: LiveHub,
    pub jwt: Arc<JwtKeys>,
}

impl AppState {
    /// Wire every repository to one MongoDB database.
    pub fn with_mongo(
        db: &mongodb::Database,
        storage_client: Arc<dyn StorageClient>,
        notifier: Arc<dyn Notifier>,
        jwt: JwtKeys,
        live_buffer: usize,
    ) -> Self {
        Self {
            users: Arc::new(MongoUserRepository::new(db)),
            sites: Arc::new(MongoSiteRepository::new(db)),
            visitors: Arc::new(MongoVisitorRepository::new(db)),
            bans: Arc::new(MongoBannedVisitorRepository::new(db)),
            incidents: Arc::new(MongoIncidentRepository::new(db)),
            emergencies: Arc::new(MongoEmergencyRepository::new(db)),
            activities: Arc::new(MongoActivityRepository::new(db)),
            subscriptions: Arc::new(MongoSubscriptionRepository::new(db)),
            storage_client,
            notifier,
            hub: LiveHub::new(live_buffer),
            jwt: Arc::new(jwt),
        }
    }
}

/// Every `/api` route.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(api::health_handler))
        // Accounts
        .route("/api/auth/register", post(api::auth::register_handler))
        .route("/api/auth/login", post(api::auth::login_handler))
        .route("/api/auth/me", get(api::auth::me_handler))
        .route(
            "/api/auth/staff",
            get(api::auth::list_staff_handler).post(api::auth::create_staff_handler),
        )
        // Sites
        .route(
            "/api/sites",
            get(api::sites::list_sites_handler).post(api::sites::create_site_handler),
        )
        .route("/api/sites/{id}", get(api::sites::get_site_handler))
        .route(
            "/api/sites/{id}/access-points",
            get(api::sites::list_access_points_handler).post(api::sites::create_access_point_handler),
        )
        .route(
            "/api/sites/{id}/access-points/{access_point_id}",
            delete(api::sites::delete_access_point_handler),
        )
        // Visitors
        .route("/api/visitors", get(api::visitors::list_handler))
        .route("/api/visitors/check-in", post(api::visitors::check_in_handler))
        .route(
            "/api/visitors/check-out/badge",
            post(api::visitors::check_out_by_badge_handler),
        )
        .route("/api/visitors/{id}", get(api::visitors::get_handler))
        .route("/api/visitors/{id}/check-out", post(api::visitors::check_out_handler))
        // Ban list
        .route(
            "/api/banned",
            get(api::banned::list_handler).post(api::banned::create_handler),
        )
        .route("/api/banned/check", post(api::banned::check_handler))
        .route("/api/banned/{id}", delete(api::banned::delete_handler))
        // Incidents
        .route(
            "/api/incidents",
            get(api::incidents::list_handler).post(api::incidents::create_handler),
        )
        .route("/api/incidents/{id}", get(api::incidents::get_handler))
        .route(
            "/api/incidents/{id}/status",
            patch(api::incidents::update_status_handler),
        )
        .route(
            "/api/incidents/{id}/attachments",
            post(api::incidents::upload_attachment_handler)
                .layer(DefaultBodyLimit::max(MAX_ATTACHMENT_BYTES + 64 * 1024)),
        )
        .route(
            "/api/incidents/{id}/attachments/{name}",
            get(api::incidents::download_attachment_handler),
        )
        // Emergencies
        .route("/api/emergency/activate", post(api::emergency::activate_handler))
        .route("/api/emergency/deactivate", post(api::emergency::deactivate_handler))
        .route("/api/emergency/status", get(api::emergency::status_handler))
        .route("/api/emergency/roll-call", get(api::emergency::roll_call_handler))
        // Activity log
        .route("/api/activities", get(api::activities::list_activities_handler))
        .route("/api/timeline", get(api::activities::timeline_handler))
        .route("/api/alerts", get(api::activities::list_alerts_handler))
        .route("/api/alerts/{id}/read", post(api::activities::mark_read_handler))
        // Billing
        .route("/api/subscriptions/me", get(api::subscriptions::me_handler))
        .route("/api/subscriptions/trial", post(api::subscriptions::trial_handler))
        .route("/api/subscriptions/plan", put(api::subscriptions::change_plan_handler))
        .route("/api/subscriptions/cancel", post(api::subscriptions::cancel_handler))
        .route(
            "/api/subscriptions/{tenant_id}/status",
            put(api::subscriptions::set_status_handler),
        )
        // Live push
        .route("/api/live", get(live_handler))
}

/// The full application: API, tracing, optional CORS and optional static frontend.
pub fn build_router(state: AppState, static_dir: Option<&str>, cors_origins: &[String]) -> Router {
    let mut router = api_routes();

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{origin}'");
                None
            }
        })
        .collect();

    if !origins.is_empty() {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        );
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
