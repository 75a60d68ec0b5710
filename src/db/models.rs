use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::models::Role;

/// Generate a new document id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// An account. Admins own a tenant (`tenant_id == id`); staff belong to one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    /// Lower-cased, unique.
    pub email: String,
    /// bcrypt hash. Never returned by the API (see [`UserProfile`]).
    pub password_hash: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: Role,
    pub tenant_id: String,
    /// Assigned site for staff roles.
    #[serde(default)]
    pub site_id: Option<String>,
    pub is_active: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Public view of a [`User`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub tenant_id: String,
    pub site_id: Option<String>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            phone: user.phone.clone(),
            role: user.role,
            tenant_id: user.tenant_id.clone(),
            site_id: user.site_id.clone(),
        }
    }
}

/// A physical location managed by a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    #[serde(rename = "_id")]
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    pub is_active: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPointKind {
    Entrance,
    Exit,
    Gate,
    Reception,
}

/// A door, gate or desk through which visitors enter a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPoint {
    #[serde(rename = "_id")]
    pub id: String,
    pub tenant_id: String,
    pub site_id: String,
    pub name: String,
    pub kind: AccessPointKind,
    pub is_active: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitorStatus {
    CheckedIn,
    CheckedOut,
}

impl VisitorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitorStatus::CheckedIn => "checked_in",
            VisitorStatus::CheckedOut => "checked_out",
        }
    }
}

/// A visit: one check-in, at most one check-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visitor {
    #[serde(rename = "_id")]
    pub id: String,
    pub tenant_id: String,
    pub site_id: String,
    #[serde(default)]
    pub access_point_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    pub host_name: String,
    pub purpose: String,
    /// Unique among checked-in visitors of the tenant.
    pub badge_number: String,
    pub status: VisitorStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub check_in_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub check_out_at: Option<DateTime<Utc>>,
    pub checked_in_by: String,
}

impl Visitor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A person refused entry, tenant-wide when `site_id` is unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BannedVisitor {
    #[serde(rename = "_id")]
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub site_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Phone number reduced to its digits.
    #[serde(default)]
    pub phone_digits: Option<String>,
    pub reason: String,
    pub banned_by: String,
    pub is_active: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Severity shared by incidents and alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Open,
    Investigating,
    Resolved,
    Closed,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "open",
            IncidentStatus::Investigating => "investigating",
            IncidentStatus::Resolved => "resolved",
            IncidentStatus::Closed => "closed",
        }
    }

    /// Allowed workflow moves. Closed is terminal.
    pub fn can_transition_to(&self, next: IncidentStatus) -> bool {
        use IncidentStatus::*;
        matches!(
            (self, next),
            (Open, Investigating)
                | (Open, Resolved)
                | (Investigating, Open)
                | (Investigating, Resolved)
                | (Resolved, Closed)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    #[serde(rename = "_id")]
    pub id: String,
    pub tenant_id: String,
    pub site_id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub reported_by: String,
    #[serde(default)]
    pub visitor_id: Option<String>,
    /// Storage keys of uploaded files.
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyAction {
    Activate,
    Deactivate,
}

impl EmergencyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmergencyAction::Activate => "activate",
            EmergencyAction::Deactivate => "deactivate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyType {
    Fire,
    Lockdown,
    Medical,
    Evacuation,
    Weather,
    Other,
}

/// One entry in a site's append-only emergency log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyEvent {
    #[serde(rename = "_id")]
    pub id: String,
    pub tenant_id: String,
    pub site_id: String,
    pub action: EmergencyAction,
    pub emergency_type: EmergencyType,
    #[serde(default)]
    pub message: String,
    pub triggered_by: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "_id")]
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub site_id: Option<String>,
    pub actor_id: String,
    /// Dotted action name, e.g. `visitor.checked_in`.
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub description: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Notification shown on dashboards and pushed live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityAlert {
    #[serde(rename = "_id")]
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub activity_id: Option<String>,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    /// Users who dismissed this alert.
    #[serde(default)]
    pub read_by: Vec<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Basic,
    Professional,
    Enterprise,
}

impl Plan {
    /// Maximum number of active sites; `None` is unlimited.
    pub fn max_sites(&self) -> Option<usize> {
        match self {
            Plan::Basic => Some(1),
            Plan::Professional => Some(5),
            Plan::Enterprise => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
}

/// Days a past-due subscription keeps working after its period ends.
pub const PAST_DUE_GRACE_DAYS: i64 = 3;

/// Billing state of a tenant. One per admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(rename = "_id")]
    pub id: String,
    pub tenant_id: String,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub current_period_end: DateTime<Utc>,
    #[serde(default)]
    pub stripe_customer_id: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Whether the tenant may use gated features at `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            SubscriptionStatus::Active | SubscriptionStatus::Trialing => {
                now < self.current_period_end
            }
            // A period end too close to the calendar limit for the grace days
            // to be added is still in the future.
            SubscriptionStatus::PastDue => self
                .current_period_end
                .checked_add_signed(Duration::days(PAST_DUE_GRACE_DAYS))
                .map_or(true, |grace_end| now < grace_end),
            SubscriptionStatus::Canceled => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription(status: SubscriptionStatus, period_end: DateTime<Utc>) -> Subscription {
        let now = Utc::now();
        Subscription {
            id: new_id(),
            tenant_id: "tenant-1".to_string(),
            plan: Plan::Basic,
            status,
            current_period_end: period_end,
            stripe_customer_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_active_subscription_usable_until_period_end() {
        let now = Utc::now();
        let sub = subscription(SubscriptionStatus::Active, now + Duration::days(1));
        assert!(sub.is_usable_at(now));
        assert!(!sub.is_usable_at(now + Duration::days(2)));
    }

    #[test]
    fn test_past_due_has_grace_period() {
        let now = Utc::now();
        let sub = subscription(SubscriptionStatus::PastDue, now - Duration::days(1));
        assert!(sub.is_usable_at(now));
        assert!(!sub.is_usable_at(now + Duration::days(PAST_DUE_GRACE_DAYS)));
    }

    #[test]
    fn test_past_due_at_calendar_limit_is_usable() {
        let sub = subscription(SubscriptionStatus::PastDue, DateTime::<Utc>::MAX_UTC);
        assert!(sub.is_usable_at(Utc::now()));
    }

    #[test]
    fn test_canceled_never_usable() {
        let now = Utc::now();
        let sub = subscription(SubscriptionStatus::Canceled, now + Duration::days(30));
        assert!(!sub.is_usable_at(now));
    }

    #[test]
    fn test_plan_site_limits() {
        assert_eq!(Plan::Basic.max_sites(), Some(1));
        assert_eq!(Plan::Professional.max_sites(), Some(5));
        assert_eq!(Plan::Enterprise.max_sites(), None);
    }

    #[test]
    fn test_incident_transitions() {
        use IncidentStatus::*;
        assert!(Open.can_transition_to(Investigating));
        assert!(Open.can_transition_to(Resolved));
        assert!(Investigating.can_transition_to(Open));
        assert!(Resolved.can_transition_to(Closed));
        assert!(!Closed.can_transition_to(Open));
        assert!(!Resolved.can_transition_to(Open));
        assert!(!Open.can_transition_to(Open));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_visitor_timestamps_serialize_as_millis() {
        let at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let visitor = Visitor {
            id: "v-1".to_string(),
            tenant_id: "t-1".to_string(),
            site_id: "s-1".to_string(),
            access_point_id: None,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: None,
            phone: None,
            company_name: None,
            host_name: "Charles".to_string(),
            purpose: "Meeting".to_string(),
            badge_number: "AG-ABC234".to_string(),
            status: VisitorStatus::CheckedIn,
            check_in_at: at,
            check_out_at: None,
            checked_in_by: "u-1".to_string(),
        };

        let json = serde_json::to_value(&visitor).unwrap();
        assert_eq!(json["_id"], "v-1");
        assert_eq!(json["check_in_at"], 1_700_000_000_123i64);
        assert_eq!(json["status"], "checked_in");
        assert!(json["check_out_at"].is_null());
    }

    #[test]
    fn test_site_defaults_for_older_documents() {
        let json = r###"{
            "_id": "s-1",
            "tenant_id": "t-1",
            "name": "HQ",
            "is_active": true,
            "created_at": 1700000000000
        }"###;

        let site: Site = serde_json::from_str(json).unwrap();
        assert_eq!(site.timezone, "UTC");
        assert!(site.address.is_empty());
    }

    #[test]
    fn test_user_profile_hides_password_hash() {
        let user = User {
            id: "u-1".to_string(),
            email: "a@example.com".to_string(),
            password_hash: "$2b$12$secret".to_string(),
            name: "A".to_string(),
            phone: None,
            role: Role::Admin,
            tenant_id: "u-1".to_string(),
            site_id: None,
            is_active: true,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&UserProfile::from(&user)).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"role\":\"admin\""));
    }
}
