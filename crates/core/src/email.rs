use crate::types::Referral;

/// Plain-text notification sent to the referee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl ReferralEmail {
    /// Composes the fixed referral message for the given participants.
    pub fn compose(
        referrer_name: &str,
        referrer_email: &str,
        referee_name: &str,
        referee_email: &str,
    ) -> Self {
        Self {
            to: referee_email.to_string(),
            subject: format!("Referral from {referrer_name}"),
            body: format!(
                "Hi {referee_name},\n\n\
                 {referrer_name} has referred you to our service. \
                 Please contact them at {referrer_email} for more information.\n\n\
                 Best regards,\nYour Company"
            ),
        }
    }

    pub fn for_referral(referral: &Referral) -> Self {
        Self::compose(
            &referral.referrer_name,
            &referral.referrer_email,
            &referral.referee_name,
            &referral.referee_email,
        )
    }
}
