use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Bson};

use crate::db::models::{Incident, IncidentStatus};
use crate::error::AppError;
use crate::tenant::SiteScope;

/// Repository trait for incident reports.
#[async_trait]
pub trait IncidentRepository: Send + Sync {
    async fn insert(&self, incident: &Incident) -> Result<(), AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Incident>, AppError>;

    /// Incidents in scope, newest first.
    async fn list(
        &self,
        scope: &SiteScope,
        status: Option<IncidentStatus>,
        limit: i64,
    ) -> Result<Vec<Incident>, AppError>;

    /// Move an incident from `from` to `to`.
    ///
    /// Conditional on the current status so concurrent updates cannot skip a
    /// workflow step. Returns `false` when the status no longer was `from`.
    async fn update_status(
        &self,
        id: &str,
        from: IncidentStatus,
        to: IncidentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    async fn add_attachment(&self, id: &str, key: &str, at: DateTime<Utc>) -> Result<(), AppError>;
}

/// MongoDB implementation of the IncidentRepository.
pub struct MongoIncidentRepository {
    collection: mongodb::Collection<Incident>,
}

impl MongoIncidentRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("incidents"),
        }
    }
}

#[async_trait]
impl IncidentRepository for MongoIncidentRepository {
    async fn insert(&self, incident: &Incident) -> Result<(), AppError> {
        self.collection
            .insert_one(incident)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Incident>, AppError> {
        self.collection
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list(
        &self,
        scope: &SiteScope,
        status: Option<IncidentStatus>,
        limit: i64,
    ) -> Result<Vec<Incident>, AppError> {
        let mut filter = scope.site_filter();
        if let Some(status) = status {
            filter.insert("status", status.as_str());
        }

        let cursor = self
            .collection
            .find(filter)
            .sort(doc! { "created_at": -1 })
            .limit(limit)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        super::collect(cursor).await
    }

    async fn update_status(
        &self,
        id: &str,
        from: IncidentStatus,
        to: IncidentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut set = doc! {
            "status": to.as_str(),
            "updated_at": at.timestamp_millis(),
        };
        match to {
            IncidentStatus::Resolved => {
                set.insert("resolved_at", at.timestamp_millis());
            }
            IncidentStatus::Open | IncidentStatus::Investigating => {
                set.insert("resolved_at", Bson::Null);
            }
            // Closing keeps the resolution time.
            IncidentStatus::Closed => {}
        }

        let result = self
            .collection
            .update_one(
                doc! { "_id": id, "status": from.as_str() },
                doc! { "$set": set },
            )
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.modified_count > 0)
    }

    async fn add_attachment(&self, id: &str, key: &str, at: DateTime<Utc>) -> Result<(), AppError> {
        self.collection
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$addToSet": { "attachments": key },
                    "$set": { "updated_at": at.timestamp_millis() },
                },
            )
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
