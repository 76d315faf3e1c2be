use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw referral payload as submitted to the intake endpoint.
///
/// Every field is optional so that an absent key and an empty string are both
/// representable; [`ReferralSubmission::validate`] decides whether the
/// submission is complete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralSubmission {
    #[serde(default)]
    pub referrer_name: Option<String>,
    #[serde(default)]
    pub referrer_email: Option<String>,
    #[serde(default)]
    pub referee_name: Option<String>,
    #[serde(default)]
    pub referee_email: Option<String>,
}

impl ReferralSubmission {
    /// Checks that all four fields are present and non-empty and stamps the
    /// record with `created_at`.
    ///
    /// Only presence is checked: email addresses are not validated for format
    /// and whitespace is kept as submitted.
    pub fn validate(self, created_at: DateTime<Utc>) -> Result<NewReferral, ValidationError> {
        let (Some(referrer_name), Some(referrer_email), Some(referee_name), Some(referee_email)) = (
            present(self.referrer_name),
            present(self.referrer_email),
            present(self.referee_name),
            present(self.referee_email),
        ) else {
            return Err(ValidationError::MissingFields);
        };

        Ok(NewReferral {
            referrer_name,
            referrer_email,
            referee_name,
            referee_email,
            created_at,
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

/// Errors raised while validating a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("All fields are required")]
    MissingFields,
}

/// A validated referral that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReferral {
    pub referrer_name: String,
    pub referrer_email: String,
    pub referee_name: String,
    pub referee_email: String,
    pub created_at: DateTime<Utc>,
}

impl NewReferral {
    /// Attaches the identifier assigned by the store.
    pub fn into_referral(self, id: impl Into<String>) -> Referral {
        Referral {
            id: id.into(),
            referrer_name: self.referrer_name,
            referrer_email: self.referrer_email,
            referee_name: self.referee_name,
            referee_email: self.referee_email,
            created_at: self.created_at,
        }
    }
}

/// A persisted referral record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Referral {
    #[serde(rename = "_id")]
    pub id: String,
    pub referrer_name: String,
    pub referrer_email: String,
    pub referee_name: String,
    pub referee_email: String,
    pub created_at: DateTime<Utc>,
}
