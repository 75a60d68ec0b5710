//! Persistence: document models and one repository per aggregate.
//!
//! Each repository is a trait so services can be tested against in-memory
//! mocks; the `Mongo*` implementations are used in production.

pub mod activity_repository;
pub mod banned_repository;
pub mod emergency_repository;
pub mod incident_repository;
pub mod indexes;
pub mod models;
pub mod site_repository;
pub mod subscription_repository;
pub mod user_repository;
pub mod visitor_repository;

#[cfg(test)]
pub(crate) mod mock;

use futures::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};

use crate::error::AppError;

const DUPLICATE_KEY: i32 = 11000;

/// Drain a cursor into a `Vec`.
pub(crate) async fn collect<T>(cursor: mongodb::Cursor<T>) -> Result<Vec<T>, AppError>
where
    T: serde::de::DeserializeOwned + Send + Sync + Unpin,
{
    cursor
        .try_collect()
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Whether a driver error is a unique-index violation.
pub(crate) fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == DUPLICATE_KEY,
        _ => false,
    }
}
