use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Row, SqlitePool,
};
use uuid::Uuid;

use referral_core::{NewReferral, Referral};

use crate::{ReferralStore, StorageError};

/// SQLite backed referral store.
#[derive(Clone)]
pub struct SqliteReferralStore {
    pool: SqlitePool,
}

impl SqliteReferralStore {
    /// Establishes a new SQLite connection pool for the provided connection string.
    /// Database files are created when missing.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StorageError::Connect)?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        apply_pragmas(&pool).await?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Loads a referral by identity.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Referral>, StorageError> {
        let row = sqlx::query(
            "SELECT id, referrer_name, referrer_email, referee_name, referee_email, created_at \
             FROM referrals WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| referral_from_row(&row)).transpose()
    }

    /// Counts stored referrals.
    pub async fn count(&self) -> Result<i64, StorageError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM referrals")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ReferralStore for SqliteReferralStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn insert(&self, referral: NewReferral) -> Result<Referral, StorageError> {
        let id = Uuid::new_v4().to_string();
        let referral = NewReferral {
            created_at: referral.created_at.trunc_subsecs(3),
            ..referral
        };

        sqlx::query(
            "INSERT INTO referrals \
             (id, referrer_name, referrer_email, referee_name, referee_email, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&referral.referrer_name)
        .bind(&referral.referrer_email)
        .bind(&referral.referee_name)
        .bind(&referral.referee_email)
        .bind(to_rfc3339(referral.created_at))
        .execute(&self.pool)
        .await?;

        Ok(referral.into_referral(id))
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query("PRAGMA journal_mode = WAL;")
        .fetch_one(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA synchronous = NORMAL;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    Ok(())
}

fn referral_from_row(row: &SqliteRow) -> Result<Referral, StorageError> {
    let created_at: String = row.try_get("created_at")?;
    Ok(Referral {
        id: row.try_get("id")?,
        referrer_name: row.try_get("referrer_name")?,
        referrer_email: row.try_get("referrer_email")?,
        referee_name: row.try_get("referee_name")?,
        referee_email: row.try_get("referee_email")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
    })
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}
