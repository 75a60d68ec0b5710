use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::db::models::{Activity, ActivityAlert, EmergencyType, Visitor, VisitorStatus};
use crate::tenant::SiteScope;

/// Emergency state change pushed to dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct EmergencyNotice {
    pub tenant_id: String,
    pub site_id: String,
    pub active: bool,
    pub emergency_type: EmergencyType,
    pub message: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub at: DateTime<Utc>,
}

/// Visitor movement pushed to reception dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct VisitorNotice {
    pub tenant_id: String,
    pub site_id: String,
    pub visitor_id: String,
    pub name: String,
    pub badge_number: String,
    pub status: VisitorStatus,
}

impl From<&Visitor> for VisitorNotice {
    fn from(visitor: &Visitor) -> Self {
        Self {
            tenant_id: visitor.tenant_id.clone(),
            site_id: visitor.site_id.clone(),
            visitor_id: visitor.id.clone(),
            name: visitor.full_name(),
            badge_number: visitor.badge_number.clone(),
            status: visitor.status,
        }
    }
}

/// Everything pushed over `/api/live`.
///
/// Serialized as `{ "event": "<kind>", "data": { ... } }`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum LiveEvent {
    Activity(Activity),
    Alert(ActivityAlert),
    Emergency(EmergencyNotice),
    Visitor(VisitorNotice),
}

impl LiveEvent {
    pub fn tenant_id(&self) -> &str {
        match self {
            LiveEvent::Activity(a) => &a.tenant_id,
            LiveEvent::Alert(a) => &a.tenant_id,
            LiveEvent::Emergency(e) => &e.tenant_id,
            LiveEvent::Visitor(v) => &v.tenant_id,
        }
    }

    pub fn site_id(&self) -> Option<&str> {
        match self {
            LiveEvent::Activity(a) => a.site_id.as_deref(),
            LiveEvent::Alert(a) => a.site_id.as_deref(),
            LiveEvent::Emergency(e) => Some(&e.site_id),
            LiveEvent::Visitor(v) => Some(&v.site_id),
        }
    }

    /// Whether a subscriber with `scope` should receive this event.
    pub fn is_visible_to(&self, scope: &SiteScope) -> bool {
        scope.admits(self.tenant_id(), self.site_id())
    }
}

/// Fan-out point for live events. Cheap to clone.
#[derive(Clone)]
pub struct LiveHub {
    sender: broadcast::Sender<LiveEvent>,
}

impl LiveHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to every connected subscriber. Dropped silently when nobody listens.
    pub fn publish(&self, event: LiveEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("Live event dropped: no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
