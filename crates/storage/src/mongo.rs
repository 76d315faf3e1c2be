use async_trait::async_trait;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime as BsonDateTime},
    Client, Collection, Database,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use referral_core::{NewReferral, Referral};

use crate::{ReferralStore, StorageError};

/// Database used when the connection string does not name one.
pub const DEFAULT_DATABASE: &str = "referralDB";
const COLLECTION: &str = "referrals";

/// MongoDB backed referral store.
#[derive(Clone)]
pub struct MongoReferralStore {
    client: Client,
    database: Database,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReferralDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    referrer_name: String,
    referrer_email: String,
    referee_name: String,
    referee_email: String,
    created_at: BsonDateTime,
}

impl ReferralDocument {
    fn new(referral: NewReferral) -> Self {
        Self {
            id: ObjectId::new(),
            referrer_name: referral.referrer_name,
            referrer_email: referral.referrer_email,
            referee_name: referral.referee_name,
            referee_email: referral.referee_email,
            created_at: BsonDateTime::from_chrono(referral.created_at),
        }
    }

    fn into_referral(self) -> Referral {
        Referral {
            id: self.id.to_hex(),
            referrer_name: self.referrer_name,
            referrer_email: self.referrer_email,
            referee_name: self.referee_name,
            referee_email: self.referee_email,
            created_at: self.created_at.to_chrono(),
        }
    }
}

impl MongoReferralStore {
    /// Builds a client for `uri`. The driver connects lazily, so an
    /// unreachable server surfaces on the first operation rather than here.
    pub async fn connect(uri: &str) -> Result<Self, StorageError> {
        let client = Client::with_uri_str(uri).await?;
        let database = client
            .default_database()
            .unwrap_or_else(|| client.database(DEFAULT_DATABASE));
        debug!(stage = "storage", database = %database.name(), "mongodb client ready");

        Ok(Self { client, database })
    }

    #[cfg(test)]
    fn database_name(&self) -> &str {
        self.database.name()
    }

    fn collection(&self) -> Collection<ReferralDocument> {
        self.database.collection(COLLECTION)
    }
}

#[async_trait]
impl ReferralStore for MongoReferralStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn insert(&self, referral: NewReferral) -> Result<Referral, StorageError> {
        let document = ReferralDocument::new(referral);
        self.collection().insert_one(&document, None).await?;
        Ok(document.into_referral())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.database.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
    }
}
