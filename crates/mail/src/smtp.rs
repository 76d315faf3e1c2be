use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use referral_core::ReferralEmail;

use crate::{Notifier, NotifyError};

/// Notifier that submits mail to an SMTP relay over TLS.
#[derive(Clone)]
pub struct SmtpNotifier {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<Mailbox>,
    relay_host: String,
}

impl SmtpNotifier {
    /// Builds the relay transport. No connection is opened until the first send.
    ///
    /// Without `credentials` the notifier is created in an unconfigured state
    /// where every send fails with [`NotifyError::NotConfigured`].
    pub fn new(
        relay_host: &str,
        credentials: Option<(&str, &str)>,
        from: Option<&str>,
    ) -> Result<Self, NotifyError> {
        let from = from.map(parse_mailbox).transpose()?;
        let transport = match credentials {
            Some((username, password)) => Some(
                AsyncSmtpTransport::<Tokio1Executor>::relay(relay_host)?
                    .credentials(Credentials::new(username.to_owned(), password.to_owned()))
                    .build(),
            ),
            None => None,
        };

        Ok(Self {
            transport,
            from,
            relay_host: relay_host.to_string(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_some() && self.from.is_some()
    }

    pub fn relay_host(&self) -> &str {
        &self.relay_host
    }

    fn build_message(&self, email: &ReferralEmail) -> Result<Message, NotifyError> {
        let from = self
            .from
            .clone()
            .ok_or(NotifyError::NotConfigured("sender address missing"))?;
        let to = parse_mailbox(&email.to)?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(NotifyError::from)
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, email: &ReferralEmail) -> Result<(), NotifyError> {
        let transport = self
            .transport
            .as_ref()
            .ok_or(NotifyError::NotConfigured("relay credentials missing"))?;
        let message = self.build_message(email)?;
        transport.send(message).await?;
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .parse()
        .map_err(|_| NotifyError::InvalidAddress(address.to_string()))
}
