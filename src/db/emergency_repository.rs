use async_trait::async_trait;
use mongodb::bson::doc;

use crate::db::models::{EmergencyAction, EmergencyEvent};
use crate::error::AppError;

/// Repository trait for the append-only emergency log.
#[async_trait]
pub trait EmergencyRepository: Send + Sync {
    async fn insert(&self, event: &EmergencyEvent) -> Result<(), AppError>;

    /// The most recent event of `action` at a site.
    async fn latest(
        &self,
        site_id: &str,
        action: EmergencyAction,
    ) -> Result<Option<EmergencyEvent>, AppError>;
}

/// MongoDB implementation of the EmergencyRepository.
pub struct MongoEmergencyRepository {
    collection: mongodb::Collection<EmergencyEvent>,
}

impl MongoEmergencyRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("emergency_events"),
        }
    }
}

#[async_trait]
impl EmergencyRepository for MongoEmergencyRepository {
    async fn insert(&self, event: &EmergencyEvent) -> Result<(), AppError> {
        self.collection
            .insert_one(event)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn latest(
        &self,
        site_id: &str,
        action: EmergencyAction,
    ) -> Result<Option<EmergencyEvent>, AppError> {
        self.collection
            .find_one(doc! { "site_id": site_id, "action": action.as_str() })
            .sort(doc! { "created_at": -1 })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
