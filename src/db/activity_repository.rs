use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::doc;

use crate::db::models::{Activity, ActivityAlert};
use crate::error::AppError;
use crate::tenant::SiteScope;

/// Time window for activity listings; bounds are `[from, to)`.
#[derive(Debug, Clone, Default)]
pub struct TimelineQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
}

/// Repository trait for the activity log and activity alerts.
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn insert_activity(&self, activity: &Activity) -> Result<(), AppError>;

    /// Activities in scope and window, newest first.
    async fn list_activities(
        &self,
        scope: &SiteScope,
        query: &TimelineQuery,
    ) -> Result<Vec<Activity>, AppError>;

    async fn insert_alert(&self, alert: &ActivityAlert) -> Result<(), AppError>;

    async fn find_alert(&self, id: &str) -> Result<Option<ActivityAlert>, AppError>;

    /// Alerts in scope, newest first; with `unread_for`, only those that user
    /// has not dismissed.
    async fn list_alerts(
        &self,
        scope: &SiteScope,
        unread_for: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ActivityAlert>, AppError>;

    async fn mark_alert_read(&self, id: &str, user_id: &str) -> Result<(), AppError>;
}

/// MongoDB implementation of the ActivityRepository.
pub struct MongoActivityRepository {
    activities: mongodb::Collection<Activity>,
    alerts: mongodb::Collection<ActivityAlert>,
}

impl MongoActivityRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            activities: db.collection("activities"),
            alerts: db.collection("activity_alerts"),
        }
    }
}

#[async_trait]
impl ActivityRepository for MongoActivityRepository {
    async fn insert_activity(&self, activity: &Activity) -> Result<(), AppError> {
        self.activities
            .insert_one(activity)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_activities(
        &self,
        scope: &SiteScope,
        query: &TimelineQuery,
    ) -> Result<Vec<Activity>, AppError> {
        let mut filter = scope.record_filter();

        let mut window = doc! {};
        if let Some(from) = query.from {
            window.insert("$gte", from.timestamp_millis());
        }
        if let Some(to) = query.to {
            window.insert("$lt", to.timestamp_millis());
        }
        if !window.is_empty() {
            filter.insert("created_at", window);
        }

        let cursor = self
            .activities
            .find(filter)
            .sort(doc! { "created_at": -1 })
            .limit(query.limit)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        super::collect(cursor).await
    }

    async fn insert_alert(&self, alert: &ActivityAlert) -> Result<(), AppError> {
        self.alerts
            .insert_one(alert)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn find_alert(&self, id: &str) -> Result<Option<ActivityAlert>, AppError> {
        self.alerts
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_alerts(
        &self,
        scope: &SiteScope,
        unread_for: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ActivityAlert>, AppError> {
        let mut filter = scope.record_filter();
        if let Some(user_id) = unread_for {
            filter.insert("read_by", doc! { "$ne": user_id });
        }

        let cursor = self
            .alerts
            .find(filter)
            .sort(doc! { "created_at": -1 })
            .limit(limit)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        super::collect(cursor).await
    }

    async fn mark_alert_read(&self, id: &str, user_id: &str) -> Result<(), AppError> {
        self.alerts
            .update_one(
                doc! { "_id": id },
                doc! { "$addToSet": { "read_by": user_id } },
            )
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
