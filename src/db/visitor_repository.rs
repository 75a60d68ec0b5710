use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::doc;

use crate::db::models::{Visitor, VisitorStatus};
use crate::error::AppError;
use crate::tenant::SiteScope;

/// Filters for listing visitors.
#[derive(Debug, Clone)]
pub struct VisitorQuery {
    pub status: Option<VisitorStatus>,
    pub limit: i64,
}

/// Repository trait for visitor records.
#[async_trait]
pub trait VisitorRepository: Send + Sync {
    async fn insert(&self, visitor: &Visitor) -> Result<(), AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Visitor>, AppError>;

    /// Whether a checked-in visitor of the tenant currently holds `badge`.
    async fn badge_in_use(&self, tenant_id: &str, badge: &str) -> Result<bool, AppError>;

    /// Mark a checked-in visitor as checked out.
    ///
    /// Returns `false` if the visitor was not checked in (already out, or missing).
    async fn check_out(&self, id: &str, at: DateTime<Utc>) -> Result<bool, AppError>;

    /// Visitors in scope, newest check-in first.
    async fn list(&self, scope: &SiteScope, query: &VisitorQuery) -> Result<Vec<Visitor>, AppError>;

    /// Visitors currently on site, oldest check-in first.
    async fn list_checked_in(&self, site_id: &str) -> Result<Vec<Visitor>, AppError>;
}

/// MongoDB implementation of the VisitorRepository.
pub struct MongoVisitorRepository {
    collection: mongodb::Collection<Visitor>,
}

impl MongoVisitorRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("visitors"),
        }
    }
}

#[async_trait]
impl VisitorRepository for MongoVisitorRepository {
    async fn insert(&self, visitor: &Visitor) -> Result<(), AppError> {
        self.collection.insert_one(visitor).await.map_err(|e| {
            if super::is_duplicate_key(&e) {
                AppError::Conflict(format!("Badge '{}' is already in use", visitor.badge_number))
            } else {
                AppError::Database(e.to_string())
            }
        })?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Visitor>, AppError> {
        self.collection
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn badge_in_use(&self, tenant_id: &str, badge: &str) -> Result<bool, AppError> {
        let count = self
            .collection
            .count_documents(doc! {
                "tenant_id": tenant_id,
                "badge_number": badge,
                "status": VisitorStatus::CheckedIn.as_str(),
            })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count > 0)
    }

    async fn check_out(&self, id: &str, at: DateTime<Utc>) -> Result<bool, AppError> {
        let result = self
            .collection
            .update_one(
                doc! { "_id": id, "status": VisitorStatus::CheckedIn.as_str() },
                doc! { "$set": {
                    "status": VisitorStatus::CheckedOut.as_str(),
                    "check_out_at": at.timestamp_millis(),
                } },
            )
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.modified_count > 0)
    }

    async fn list(&self, scope: &SiteScope, query: &VisitorQuery) -> Result<Vec<Visitor>, AppError> {
        let mut filter = scope.site_filter();
        if let Some(status) = query.status {
            filter.insert("status", status.as_str());
        }

        let cursor = self
            .collection
            .find(filter)
            .sort(doc! { "check_in_at": -1 })
            .limit(query.limit)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        super::collect(cursor).await
    }

    async fn list_checked_in(&self, site_id: &str) -> Result<Vec<Visitor>, AppError> {
        let cursor = self
            .collection
            .find(doc! {
                "site_id": site_id,
                "status": VisitorStatus::CheckedIn.as_str(),
            })
            .sort(doc! { "check_in_at": 1 })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        super::collect(cursor).await
    }
}
