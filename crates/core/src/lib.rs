//! Domain types shared by the intake endpoint, the storage backends and the
//! notification sender.
pub mod email;
pub mod types;

pub use email::ReferralEmail;
pub use types::{NewReferral, Referral, ReferralSubmission, ValidationError};
