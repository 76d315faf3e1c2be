//! Persistence for referral records.
//!
//! The service talks to storage through [`ReferralStore`]. Two backends are
//! provided and picked from the connection URL by [`connect`]:
//! `mongodb://` (and `mongodb+srv://`) selects the document store, `sqlite:`
//! selects an embedded SQLite database managed through the workspace
//! `migrations/`.
mod mongo;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::migrate::MigrateError;
use thiserror::Error;

use referral_core::{NewReferral, Referral};

pub use mongo::MongoReferralStore;
pub use sqlite::SqliteReferralStore;

/// Write access to the referral collection.
#[async_trait]
pub trait ReferralStore: Send + Sync {
    /// Short backend name used in logs.
    fn backend(&self) -> &'static str;

    /// Persists a validated referral and returns it with its assigned identity.
    async fn insert(&self, referral: NewReferral) -> Result<Referral, StorageError>;

    /// Round-trips to the backend to check it is reachable.
    async fn ping(&self) -> Result<(), StorageError>;

    /// Releases pooled connections. Called once during shutdown.
    async fn close(&self);
}

/// Opens the backend named by `database_url`.
pub async fn connect(database_url: &str) -> Result<Arc<dyn ReferralStore>, StorageError> {
    if database_url.starts_with("mongodb://") || database_url.starts_with("mongodb+srv://") {
        let store = MongoReferralStore::connect(database_url).await?;
        Ok(Arc::new(store))
    } else if database_url.starts_with("sqlite:") {
        let store = SqliteReferralStore::connect(database_url).await?;
        store.run_migrations().await?;
        Ok(Arc::new(store))
    } else {
        Err(StorageError::UnsupportedUrl(database_url.to_string()))
    }
}

/// Storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unsupported database url: {0}")]
    UnsupportedUrl(String),
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to apply pragma: {0}")]
    Pragma(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("invalid stored timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
