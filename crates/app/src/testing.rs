//! In-memory doubles for the storage and mail collaborators.
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use referral_core::{NewReferral, Referral, ReferralEmail};
use referral_mail::{Notifier, NotifyError};
use referral_storage::{ReferralStore, StorageError};

use crate::router::AppState;
use crate::telemetry;

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub struct RecordingStore {
    records: Mutex<Vec<Referral>>,
    fail: bool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn records(&self) -> Vec<Referral> {
        self.records.lock().expect("store lock").clone()
    }
}

#[async_trait]
impl ReferralStore for RecordingStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, referral: NewReferral) -> Result<Referral, StorageError> {
        if self.fail {
            return Err(StorageError::Unavailable("connection refused".into()));
        }
        let mut records = self.records.lock().expect("store lock");
        let referral = referral.into_referral(format!("ref-{}", records.len() + 1));
        records.push(referral.clone());
        Ok(referral)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn close(&self) {}
}

pub struct RecordingNotifier {
    sent: Mutex<Vec<ReferralEmail>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Every attempted email, including ones that failed.
    pub fn attempts(&self) -> Vec<ReferralEmail> {
        self.sent.lock().expect("notifier lock").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, email: &ReferralEmail) -> Result<(), NotifyError> {
        self.sent.lock().expect("notifier lock").push(email.clone());
        if self.fail {
            Err(NotifyError::Unavailable("relay rejected credentials".into()))
        } else {
            Ok(())
        }
    }
}

pub fn test_state(
    store: RecordingStore,
    notifier: RecordingNotifier,
) -> (AppState, Arc<RecordingStore>, Arc<RecordingNotifier>) {
    let metrics = telemetry::init_metrics().expect("metrics init");
    let store = Arc::new(store);
    let notifier = Arc::new(notifier);
    let state = AppState::new(metrics, store.clone(), notifier.clone())
        .with_clock(Arc::new(fixed_now));
    (state, store, notifier)
}
