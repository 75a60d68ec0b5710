use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};

use crate::db::models::BannedVisitor;
use crate::error::AppError;
use crate::services::banned::{anchored_pattern, BanCandidate};
use crate::tenant::SiteScope;

/// Repository trait for the banned-visitor list.
#[async_trait]
pub trait BannedVisitorRepository: Send + Sync {
    async fn insert(&self, ban: &BannedVisitor) -> Result<(), AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<BannedVisitor>, AppError>;

    /// Active bans visible in the scope (site bans plus tenant-wide bans).
    async fn list_active(&self, scope: &SiteScope) -> Result<Vec<BannedVisitor>, AppError>;

    /// Soft-delete. Returns `false` if the ban was not active.
    async fn deactivate(&self, id: &str) -> Result<bool, AppError>;

    /// Active bans that may match the candidate.
    ///
    /// Implementations may over-approximate; callers confirm each hit with
    /// [`BanCandidate::matches`].
    async fn find_candidates(&self, candidate: &BanCandidate) -> Result<Vec<BannedVisitor>, AppError>;
}

/// MongoDB implementation of the BannedVisitorRepository.
pub struct MongoBannedVisitorRepository {
    collection: mongodb::Collection<BannedVisitor>,
}

impl MongoBannedVisitorRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("banned_visitors"),
        }
    }
}

fn case_insensitive(value: &str) -> Document {
    doc! { "$regex": anchored_pattern(value), "$options": "i" }
}

/// Build the identity half of the match query: full name, email or phone.
fn identity_clauses(candidate: &BanCandidate) -> Vec<Bson> {
    let mut clauses = vec![Bson::Document(doc! {
        "first_name": case_insensitive(&candidate.first_name),
        "last_name": case_insensitive(&candidate.last_name),
    })];

    if let Some(email) = candidate.email.as_deref() {
        clauses.push(Bson::Document(doc! { "email": case_insensitive(email) }));
    }
    if let Some(phone) = candidate.phone_digits.as_deref() {
        clauses.push(Bson::Document(doc! { "phone_digits": phone }));
    }

    clauses
}

#[async_trait]
impl BannedVisitorRepository for MongoBannedVisitorRepository {
    async fn insert(&self, ban: &BannedVisitor) -> Result<(), AppError> {
        self.collection
            .insert_one(ban)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<BannedVisitor>, AppError> {
        self.collection
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_active(&self, scope: &SiteScope) -> Result<Vec<BannedVisitor>, AppError> {
        let mut filter = scope.record_filter();
        filter.insert("is_active", true);

        let cursor = self
            .collection
            .find(filter)
            .sort(doc! { "last_name": 1, "first_name": 1 })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        super::collect(cursor).await
    }

    async fn deactivate(&self, id: &str) -> Result<bool, AppError> {
        let result = self
            .collection
            .update_one(
                doc! { "_id": id, "is_active": true },
                doc! { "$set": { "is_active": false } },
            )
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.modified_count > 0)
    }

    async fn find_candidates(&self, candidate: &BanCandidate) -> Result<Vec<BannedVisitor>, AppError> {
        let filter = doc! {
            "tenant_id": &candidate.tenant_id,
            "is_active": true,
            "$and": [
                { "$or": [ { "site_id": null }, { "site_id": &candidate.site_id } ] },
                { "$or": identity_clauses(candidate) },
            ],
        };

        let cursor = self
            .collection
            .find(filter)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        super::collect(cursor).await
    }
}
