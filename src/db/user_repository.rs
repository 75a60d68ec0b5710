use async_trait::async_trait;
use mongodb::bson::doc;

use crate::db::models::User;
use crate::error::AppError;

/// Repository trait for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. A duplicate email yields `AppError::Conflict`.
    async fn insert(&self, user: &User) -> Result<(), AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError>;

    /// Look up by email; `email` must already be lower-cased.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Every user of a tenant, the admin included.
    async fn list_by_tenant(&self, tenant_id: &str) -> Result<Vec<User>, AppError>;
}

/// MongoDB implementation of the UserRepository.
pub struct MongoUserRepository {
    collection: mongodb::Collection<User>,
}

impl MongoUserRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("users"),
        }
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn insert(&self, user: &User) -> Result<(), AppError> {
        self.collection.insert_one(user).await.map_err(|e| {
            if super::is_duplicate_key(&e) {
                AppError::Conflict(format!("An account with email '{}' already exists", user.email))
            } else {
                AppError::Database(e.to_string())
            }
        })?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        self.collection
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.collection
            .find_one(doc! { "email": email })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_by_tenant(&self, tenant_id: &str) -> Result<Vec<User>, AppError> {
        let cursor = self
            .collection
            .find(doc! { "tenant_id": tenant_id })
            .sort(doc! { "created_at": 1 })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        super::collect(cursor).await
    }
}
