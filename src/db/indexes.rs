use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::IndexModel;

use crate::error::AppError;

/// Create the indexes the repositories rely on. Idempotent.
///
/// Uniqueness constraints live here: one account per email, one subscription
/// per tenant, one badge number per checked-in visitor of a tenant.
pub async fn ensure_indexes(db: &mongodb::Database) -> Result<(), AppError> {
    let unique = |keys: mongodb::bson::Document| {
        IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(true).build())
            .build()
    };

    db.collection::<mongodb::bson::Document>("users")
        .create_index(unique(doc! { "email": 1 }))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    db.collection::<mongodb::bson::Document>("subscriptions")
        .create_index(unique(doc! { "tenant_id": 1 }))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    let active_badge = IndexModel::builder()
        .keys(doc! { "tenant_id": 1, "badge_number": 1 })
        .options(
            IndexOptions::builder()
                .unique(true)
                .partial_filter_expression(doc! { "status": "checked_in" })
                .build(),
        )
        .build();

    let visitors = db.collection::<mongodb::bson::Document>("visitors");
    visitors
        .create_index(active_badge)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    visitors
        .create_index(IndexModel::builder().keys(doc! { "site_id": 1, "check_in_at": -1 }).build())
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    db.collection::<mongodb::bson::Document>("emergency_events")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "site_id": 1, "action": 1, "created_at": -1 })
                .build(),
        )
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    db.collection::<mongodb::bson::Document>("activities")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "tenant_id": 1, "created_at": -1 })
                .build(),
        )
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    tracing::info!("MongoDB indexes ensured");
    Ok(())
}
