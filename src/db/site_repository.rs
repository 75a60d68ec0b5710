use async_trait::async_trait;
use mongodb::bson::doc;

use crate::db::models::{AccessPoint, Site};
use crate::error::AppError;
use crate::tenant::SiteScope;

/// Repository trait for sites and their access points.
#[async_trait]
pub trait SiteRepository: Send + Sync {
    async fn insert_site(&self, site: &Site) -> Result<(), AppError>;

    async fn find_site(&self, id: &str) -> Result<Option<Site>, AppError>;

    /// All sites owned by a tenant, active or not.
    async fn list_sites_for_tenant(&self, tenant_id: &str) -> Result<Vec<Site>, AppError>;

    /// Sites inside a scope, sorted by name.
    async fn list_sites(&self, scope: &SiteScope) -> Result<Vec<Site>, AppError>;

    async fn count_active_sites(&self, tenant_id: &str) -> Result<u64, AppError>;

    async fn insert_access_point(&self, access_point: &AccessPoint) -> Result<(), AppError>;

    async fn find_access_point(&self, id: &str) -> Result<Option<AccessPoint>, AppError>;

    /// Active access points of a site.
    async fn list_access_points(&self, site_id: &str) -> Result<Vec<AccessPoint>, AppError>;

    /// Soft-delete. Returns `false` if nothing was active under that id.
    async fn deactivate_access_point(&self, id: &str) -> Result<bool, AppError>;
}

/// MongoDB implementation of the SiteRepository.
pub struct MongoSiteRepository {
    sites: mongodb::Collection<Site>,
    access_points: mongodb::Collection<AccessPoint>,
}

impl MongoSiteRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            sites: db.collection("sites"),
            access_points: db.collection("access_points"),
        }
    }
}

#[async_trait]
impl SiteRepository for MongoSiteRepository {
    async fn insert_site(&self, site: &Site) -> Result<(), AppError> {
        self.sites
            .insert_one(site)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn find_site(&self, id: &str) -> Result<Option<Site>, AppError> {
        self.sites
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_sites_for_tenant(&self, tenant_id: &str) -> Result<Vec<Site>, AppError> {
        let cursor = self
            .sites
            .find(doc! { "tenant_id": tenant_id })
            .sort(doc! { "name": 1 })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        super::collect(cursor).await
    }

    async fn list_sites(&self, scope: &SiteScope) -> Result<Vec<Site>, AppError> {
        // Sites are keyed by `_id`, not `site_id`, so the scope filter is built here.
        let filter = match scope {
            SiteScope::All => doc! {},
            SiteScope::Tenant { site_ids, .. } => doc! { "_id": { "$in": site_ids } },
        };

        let cursor = self
            .sites
            .find(filter)
            .sort(doc! { "name": 1 })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        super::collect(cursor).await
    }

    async fn count_active_sites(&self, tenant_id: &str) -> Result<u64, AppError> {
        self.sites
            .count_documents(doc! { "tenant_id": tenant_id, "is_active": true })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn insert_access_point(&self, access_point: &AccessPoint) -> Result<(), AppError> {
        self.access_points
            .insert_one(access_point)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn find_access_point(&self, id: &str) -> Result<Option<AccessPoint>, AppError> {
        self.access_points
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_access_points(&self, site_id: &str) -> Result<Vec<AccessPoint>, AppError> {
        let cursor = self
            .access_points
            .find(doc! { "site_id": site_id, "is_active": true })
            .sort(doc! { "name": 1 })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        super::collect(cursor).await
    }

    async fn deactivate_access_point(&self, id: &str) -> Result<bool, AppError> {
        let result = self
            .access_points
            .update_one(
                doc! { "_id": id, "is_active": true },
                doc! { "$set": { "is_active": false } },
            )
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.modified_count > 0)
    }
}
