use async_trait::async_trait;
use mongodb::bson::doc;

use crate::db::models::Subscription;
use crate::error::AppError;

/// Repository trait for tenant subscriptions (one per tenant).
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn find_by_tenant(&self, tenant_id: &str) -> Result<Option<Subscription>, AppError>;

    /// Insert; a second subscription for the same tenant yields `AppError::Conflict`.
    async fn insert(&self, subscription: &Subscription) -> Result<(), AppError>;

    /// Replace the stored subscription (matched by id).
    async fn update(&self, subscription: &Subscription) -> Result<(), AppError>;
}

/// MongoDB implementation of the SubscriptionRepository.
pub struct MongoSubscriptionRepository {
    collection: mongodb::Collection<Subscription>,
}

impl MongoSubscriptionRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("subscriptions"),
        }
    }
}

#[async_trait]
impl SubscriptionRepository for MongoSubscriptionRepository {
    async fn find_by_tenant(&self, tenant_id: &str) -> Result<Option<Subscription>, AppError> {
        self.collection
            .find_one(doc! { "tenant_id": tenant_id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn insert(&self, subscription: &Subscription) -> Result<(), AppError> {
        self.collection.insert_one(subscription).await.map_err(|e| {
            if super::is_duplicate_key(&e) {
                AppError::Conflict("This account already has a subscription".into())
            } else {
                AppError::Database(e.to_string())
            }
        })?;
        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), AppError> {
        let result = self
            .collection
            .replace_one(doc! { "_id": &subscription.id }, subscription)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!(
                "Subscription '{}' not found",
                subscription.id
            )));
        }
        Ok(())
    }
}
