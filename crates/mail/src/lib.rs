//! Referee notification over an SMTP relay.
//!
//! [`SmtpNotifier`] wraps a pooled [lettre](https://lettre.rs) transport built
//! once at startup. Callers go through [`send_best_effort`], which logs the
//! outcome and never propagates a failure.
mod smtp;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info};

use referral_core::ReferralEmail;

pub use smtp::SmtpNotifier;

/// Delivers referral emails.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: &ReferralEmail) -> Result<(), NotifyError>;
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("mail relay not configured: {0}")]
    NotConfigured(&'static str),
    #[error("invalid email address: {0}")]
    InvalidAddress(String),
    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("mail relay unavailable: {0}")]
    Unavailable(String),
}

/// Result of a best-effort send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    Failed,
}

impl NotifyOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

/// Sends `email` once, logging success or failure. Errors are swallowed.
pub async fn send_best_effort(notifier: &dyn Notifier, email: &ReferralEmail) -> NotifyOutcome {
    match notifier.send(email).await {
        Ok(()) => {
            info!(stage = "notify", to = %email.to, subject = %email.subject, "referral email sent");
            NotifyOutcome::Sent
        }
        Err(err) => {
            error!(stage = "notify", to = %email.to, error = %err, "failed to send referral email");
            NotifyOutcome::Failed
        }
    }
}
