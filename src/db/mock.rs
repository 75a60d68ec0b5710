//! In-memory repositories and fixtures for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::app::AppState;
use crate::auth::jwt::JwtKeys;
use crate::auth::models::{AuthenticatedUser, Role};
use crate::db::activity_repository::{ActivityRepository, TimelineQuery};
use crate::db::banned_repository::BannedVisitorRepository;
use crate::db::emergency_repository::EmergencyRepository;
use crate::db::incident_repository::IncidentRepository;
use crate::db::models::*;
use crate::db::site_repository::SiteRepository;
use crate::db::subscription_repository::SubscriptionRepository;
use crate::db::user_repository::UserRepository;
use crate::db::visitor_repository::{VisitorQuery, VisitorRepository};
use crate::error::AppError;
use crate::notify::LogNotifier;
use crate::realtime::hub::LiveHub;
use crate::services::activity::ActivityDraft;
use crate::services::banned::BanCandidate;
use crate::storage::client::{StorageClient, StoredObject};
use crate::tenant::SiteScope;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    sites: Vec<Site>,
    access_points: Vec<AccessPoint>,
    visitors: Vec<Visitor>,
    bans: Vec<BannedVisitor>,
    incidents: Vec<Incident>,
    emergencies: Vec<EmergencyEvent>,
    activities: Vec<Activity>,
    alerts: Vec<ActivityAlert>,
    subscriptions: Vec<Subscription>,
}

/// Every repository trait backed by one mutex-guarded set of vectors.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_activity_writes: AtomicBool,
    all_badges_taken: AtomicBool,
    lost_badge_races: AtomicUsize,
}

impl MemoryStore {
    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn put_user(&self, user: User) {
        self.tables().users.push(user);
    }

    pub fn put_site(&self, site: Site) {
        self.tables().sites.push(site);
    }

    pub fn put_visitor(&self, visitor: Visitor) {
        self.tables().visitors.push(visitor);
    }

    pub fn put_activity_at(&self, draft: ActivityDraft, at: DateTime<Utc>) {
        self.tables().activities.push(Activity {
            id: new_id(),
            tenant_id: draft.tenant_id,
            site_id: draft.site_id,
            actor_id: draft.actor_id,
            action: draft.action.to_string(),
            entity_type: draft.entity_type.to_string(),
            entity_id: draft.entity_id,
            description: draft.description,
            created_at: at,
        });
    }

    pub fn activity_count(&self) -> usize {
        self.tables().activities.len()
    }

    pub fn alert_count(&self) -> usize {
        self.tables().alerts.len()
    }

    pub fn visitor_count(&self) -> usize {
        self.tables().visitors.len()
    }

    /// Make activity and alert inserts fail.
    pub fn fail_activity_writes(&self, fail: bool) {
        self.fail_activity_writes.store(fail, Ordering::SeqCst);
    }

    /// Report every badge number as taken.
    pub fn set_all_badges_taken(&self, taken: bool) {
        self.all_badges_taken.store(taken, Ordering::SeqCst);
    }

    /// Reject the next `count` visitor inserts as if a concurrent check-in
    /// had just claimed the same badge.
    pub fn lose_badge_races(&self, count: usize) {
        self.lost_badge_races.store(count, Ordering::SeqCst);
    }

    fn activity_write(&self) -> Result<(), AppError> {
        if self.fail_activity_writes.load(Ordering::SeqCst) {
            Err(AppError::Database("activity store unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert(&self, user: &User) -> Result<(), AppError> {
        let mut tables = self.tables();
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("An account with this email already exists".into()));
        }
        tables.users.push(user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        Ok(self.tables().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.tables().users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_by_tenant(&self, tenant_id: &str) -> Result<Vec<User>, AppError> {
        Ok(self
            .tables()
            .users
            .iter()
            .filter(|u| u.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SiteRepository for MemoryStore {
    async fn insert_site(&self, site: &Site) -> Result<(), AppError> {
        self.tables().sites.push(site.clone());
        Ok(())
    }

    async fn find_site(&self, id: &str) -> Result<Option<Site>, AppError> {
        Ok(self.tables().sites.iter().find(|s| s.id == id).cloned())
    }

    async fn list_sites_for_tenant(&self, tenant_id: &str) -> Result<Vec<Site>, AppError> {
        Ok(self
            .tables()
            .sites
            .iter()
            .filter(|s| s.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn list_sites(&self, scope: &SiteScope) -> Result<Vec<Site>, AppError> {
        let mut sites: Vec<Site> = self
            .tables()
            .sites
            .iter()
            .filter(|s| scope.admits(&s.tenant_id, Some(&s.id)))
            .cloned()
            .collect();
        sites.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sites)
    }

    async fn count_active_sites(&self, tenant_id: &str) -> Result<u64, AppError> {
        Ok(self
            .tables()
            .sites
            .iter()
            .filter(|s| s.tenant_id == tenant_id && s.is_active)
            .count() as u64)
    }

    async fn insert_access_point(&self, access_point: &AccessPoint) -> Result<(), AppError> {
        self.tables().access_points.push(access_point.clone());
        Ok(())
    }

    async fn find_access_point(&self, id: &str) -> Result<Option<AccessPoint>, AppError> {
        Ok(self.tables().access_points.iter().find(|a| a.id == id).cloned())
    }

    async fn list_access_points(&self, site_id: &str) -> Result<Vec<AccessPoint>, AppError> {
        Ok(self
            .tables()
            .access_points
            .iter()
            .filter(|a| a.site_id == site_id && a.is_active)
            .cloned()
            .collect())
    }

    async fn deactivate_access_point(&self, id: &str) -> Result<bool, AppError> {
        let mut tables = self.tables();
        match tables.access_points.iter_mut().find(|a| a.id == id && a.is_active) {
            Some(ap) => {
                ap.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl VisitorRepository for MemoryStore {
    async fn insert(&self, visitor: &Visitor) -> Result<(), AppError> {
        let raced = self
            .lost_badge_races
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if raced {
            return Err(AppError::Conflict("Badge number already in use".into()));
        }

        let mut tables = self.tables();
        let clash = tables.visitors.iter().any(|v| {
            v.tenant_id == visitor.tenant_id
                && v.badge_number == visitor.badge_number
                && v.status == VisitorStatus::CheckedIn
        });
        if clash {
            return Err(AppError::Conflict("Badge number already in use".into()));
        }
        tables.visitors.push(visitor.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Visitor>, AppError> {
        Ok(self.tables().visitors.iter().find(|v| v.id == id).cloned())
    }

    async fn badge_in_use(&self, tenant_id: &str, badge: &str) -> Result<bool, AppError> {
        if self.all_badges_taken.load(Ordering::SeqCst) {
            return Ok(true);
        }
        Ok(self.tables().visitors.iter().any(|v| {
            v.tenant_id == tenant_id && v.badge_number == badge && v.status == VisitorStatus::CheckedIn
        }))
    }

    async fn check_out(&self, id: &str, at: DateTime<Utc>) -> Result<bool, AppError> {
        let mut tables = self.tables();
        match tables
            .visitors
            .iter_mut()
            .find(|v| v.id == id && v.status == VisitorStatus::CheckedIn)
        {
            Some(visitor) => {
                visitor.status = VisitorStatus::CheckedOut;
                visitor.check_out_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self, scope: &SiteScope, query: &VisitorQuery) -> Result<Vec<Visitor>, AppError> {
        let mut visitors: Vec<Visitor> = self
            .tables()
            .visitors
            .iter()
            .filter(|v| scope.admits(&v.tenant_id, Some(&v.site_id)))
            .filter(|v| query.status.map_or(true, |s| v.status == s))
            .cloned()
            .collect();
        visitors.sort_by(|a, b| b.check_in_at.cmp(&a.check_in_at));
        visitors.truncate(query.limit as usize);
        Ok(visitors)
    }

    async fn list_checked_in(&self, site_id: &str) -> Result<Vec<Visitor>, AppError> {
        let mut visitors: Vec<Visitor> = self
            .tables()
            .visitors
            .iter()
            .filter(|v| v.site_id == site_id && v.status == VisitorStatus::CheckedIn)
            .cloned()
            .collect();
        visitors.sort_by(|a, b| a.check_in_at.cmp(&b.check_in_at));
        Ok(visitors)
    }
}

#[async_trait]
impl BannedVisitorRepository for MemoryStore {
    async fn insert(&self, ban: &BannedVisitor) -> Result<(), AppError> {
        self.tables().bans.push(ban.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<BannedVisitor>, AppError> {
        Ok(self.tables().bans.iter().find(|b| b.id == id).cloned())
    }

    async fn list_active(&self, scope: &SiteScope) -> Result<Vec<BannedVisitor>, AppError> {
        Ok(self
            .tables()
            .bans
            .iter()
            .filter(|b| b.is_active && scope.admits(&b.tenant_id, b.site_id.as_deref()))
            .cloned()
            .collect())
    }

    async fn deactivate(&self, id: &str) -> Result<bool, AppError> {
        let mut tables = self.tables();
        match tables.bans.iter_mut().find(|b| b.id == id && b.is_active) {
            Some(ban) => {
                ban.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_candidates(&self, candidate: &BanCandidate) -> Result<Vec<BannedVisitor>, AppError> {
        Ok(self
            .tables()
            .bans
            .iter()
            .filter(|b| b.is_active && b.tenant_id == candidate.tenant_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl IncidentRepository for MemoryStore {
    async fn insert(&self, incident: &Incident) -> Result<(), AppError> {
        self.tables().incidents.push(incident.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Incident>, AppError> {
        Ok(self.tables().incidents.iter().find(|i| i.id == id).cloned())
    }

    async fn list(
        &self,
        scope: &SiteScope,
        status: Option<IncidentStatus>,
        limit: i64,
    ) -> Result<Vec<Incident>, AppError> {
        let mut incidents: Vec<Incident> = self
            .tables()
            .incidents
            .iter()
            .filter(|i| scope.admits(&i.tenant_id, Some(&i.site_id)))
            .filter(|i| status.map_or(true, |s| i.status == s))
            .cloned()
            .collect();
        incidents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        incidents.truncate(limit as usize);
        Ok(incidents)
    }

    async fn update_status(
        &self,
        id: &str,
        from: IncidentStatus,
        to: IncidentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut tables = self.tables();
        let Some(incident) = tables.incidents.iter_mut().find(|i| i.id == id && i.status == from) else {
            return Ok(false);
        };
        incident.status = to;
        incident.updated_at = at;
        match to {
            IncidentStatus::Resolved => incident.resolved_at = Some(at),
            IncidentStatus::Open | IncidentStatus::Investigating => incident.resolved_at = None,
            IncidentStatus::Closed => {}
        }
        Ok(true)
    }

    async fn add_attachment(&self, id: &str, key: &str, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut tables = self.tables();
        let incident = tables
            .incidents
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Incident '{}' not found", id)))?;
        incident.attachments.push(key.to_string());
        incident.updated_at = at;
        Ok(())
    }
}

#[async_trait]
impl EmergencyRepository for MemoryStore {
    async fn insert(&self, event: &EmergencyEvent) -> Result<(), AppError> {
        self.tables().emergencies.push(event.clone());
        Ok(())
    }

    async fn latest(
        &self,
        site_id: &str,
        action: EmergencyAction,
    ) -> Result<Option<EmergencyEvent>, AppError> {
        Ok(self
            .tables()
            .emergencies
            .iter()
            .filter(|e| e.site_id == site_id && e.action == action)
            .max_by_key(|e| e.created_at)
            .cloned())
    }
}

#[async_trait]
impl ActivityRepository for MemoryStore {
    async fn insert_activity(&self, activity: &Activity) -> Result<(), AppError> {
        self.activity_write()?;
        self.tables().activities.push(activity.clone());
        Ok(())
    }

    async fn list_activities(
        &self,
        scope: &SiteScope,
        query: &TimelineQuery,
    ) -> Result<Vec<Activity>, AppError> {
        let mut activities: Vec<Activity> = self
            .tables()
            .activities
            .iter()
            .filter(|a| scope.admits(&a.tenant_id, a.site_id.as_deref()))
            .filter(|a| query.from.map_or(true, |from| a.created_at >= from))
            .filter(|a| query.to.map_or(true, |to| a.created_at < to))
            .cloned()
            .collect();
        activities.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        activities.truncate(query.limit as usize);
        Ok(activities)
    }

    async fn insert_alert(&self, alert: &ActivityAlert) -> Result<(), AppError> {
        self.activity_write()?;
        self.tables().alerts.push(alert.clone());
        Ok(())
    }

    async fn find_alert(&self, id: &str) -> Result<Option<ActivityAlert>, AppError> {
        Ok(self.tables().alerts.iter().find(|a| a.id == id).cloned())
    }

    async fn list_alerts(
        &self,
        scope: &SiteScope,
        unread_for: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ActivityAlert>, AppError> {
        let mut alerts: Vec<ActivityAlert> = self
            .tables()
            .alerts
            .iter()
            .filter(|a| scope.admits(&a.tenant_id, a.site_id.as_deref()))
            .filter(|a| unread_for.map_or(true, |user| !a.read_by.iter().any(|r| r == user)))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        alerts.truncate(limit as usize);
        Ok(alerts)
    }

    async fn mark_alert_read(&self, id: &str, user_id: &str) -> Result<(), AppError> {
        let mut tables = self.tables();
        let alert = tables
            .alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Alert '{}' not found", id)))?;
        if !alert.read_by.iter().any(|r| r == user_id) {
            alert.read_by.push(user_id.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionRepository for MemoryStore {
    async fn find_by_tenant(&self, tenant_id: &str) -> Result<Option<Subscription>, AppError> {
        Ok(self
            .tables()
            .subscriptions
            .iter()
            .find(|s| s.tenant_id == tenant_id)
            .cloned())
    }

    async fn insert(&self, subscription: &Subscription) -> Result<(), AppError> {
        let mut tables = self.tables();
        if tables.subscriptions.iter().any(|s| s.tenant_id == subscription.tenant_id) {
            return Err(AppError::Conflict("This account already has a subscription".into()));
        }
        tables.subscriptions.push(subscription.clone());
        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), AppError> {
        let mut tables = self.tables();
        let slot = tables
            .subscriptions
            .iter_mut()
            .find(|s| s.id == subscription.id)
            .ok_or_else(|| AppError::NotFound("Subscription not found".into()))?;
        *slot = subscription.clone();
        Ok(())
    }
}

/// Blob storage kept in a map.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
}

#[async_trait]
impl StorageClient for MemoryStorage {
    async fn put_object(&self, key: &str, content: Vec<u8>, content_type: &str) -> Result<(), AppError> {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                content,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<StoredObject>, AppError> {
        Ok(self.objects.lock().unwrap().get(key).cloned())
    }
}

/// State wired entirely to one [`MemoryStore`].
pub fn mock_state() -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::default());
    let state = AppState {
        users: store.clone(),
        sites: store.clone(),
        visitors: store.clone(),
        bans: store.clone(),
        incidents: store.clone(),
        emergencies: store.clone(),
        activities: store.clone(),
        subscriptions: store.clone(),
        storage_client: Arc::new(MemoryStorage::default()),
        notifier: Arc::new(LogNotifier),
        hub: LiveHub::new(64),
        jwt: Arc::new(JwtKeys::new("test-secret", 1)),
    };
    (state, store)
}

pub fn sample_user(id: &str, role: Role, tenant_id: &str) -> User {
    User {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        password_hash: String::new(),
        name: id.to_string(),
        phone: None,
        role,
        tenant_id: tenant_id.to_string(),
        site_id: None,
        is_active: true,
        created_at: Utc::now(),
    }
}

pub fn sample_site(id: &str, tenant_id: &str) -> Site {
    Site {
        id: id.to_string(),
        tenant_id: tenant_id.to_string(),
        name: format!("Site {id}"),
        address: String::new(),
        timezone: "UTC".to_string(),
        is_active: true,
        created_at: Utc::now(),
    }
}

pub fn sample_visitor(id: &str, tenant_id: &str, site_id: &str) -> Visitor {
    Visitor {
        id: id.to_string(),
        tenant_id: tenant_id.to_string(),
        site_id: site_id.to_string(),
        access_point_id: None,
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: None,
        phone: None,
        company_name: None,
        host_name: "Charles".to_string(),
        purpose: "Meeting".to_string(),
        badge_number: format!("AG-{id}"),
        status: VisitorStatus::CheckedIn,
        check_in_at: Utc::now(),
        check_out_at: None,
        checked_in_by: "desk".to_string(),
    }
}

pub fn auth_user(id: &str, role: Role, tenant_id: &str, site_id: Option<&str>) -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: id.to_string(),
        email: format!("{id}@example.com"),
        name: id.to_string(),
        role,
        tenant_id: tenant_id.to_string(),
        site_id: site_id.map(String::from),
    }
}

/// Give `tenant_id` an active professional subscription for the next 30 days.
pub fn with_subscription(store: &MemoryStore, tenant_id: &str) {
    let now = Utc::now();
    store.tables().subscriptions.push(Subscription {
        id: new_id(),
        tenant_id: tenant_id.to_string(),
        plan: Plan::Professional,
        status: SubscriptionStatus::Active,
        current_period_end: now + Duration::days(30),
        stripe_customer_id: None,
        created_at: now,
        updated_at: now,
    });
}
