use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType, transport::smtp::authentication::Credentials,
};
use std::sync::{Arc, Mutex};

use crate::config::SmtpConfig;

/// MailError
///
/// Failures while building or delivering an outbound message. Delivery is not retried;
/// the error propagates to the request that triggered it.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("email build error: {0}")]
    Build(String),

    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

/// Mailer
///
/// The outbound mail capability injected into the sign-up flow. Swapping the
/// implementation (SMTP, console log, recording mock) never touches the handlers.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers a freshly issued confirmation code to `email`.
    async fn send_confirmation_code(&self, email: &str, code: &str) -> Result<(), MailError>;
}

/// MailerState
///
/// The concrete type used to share the mailer across the application state.
pub type MailerState = Arc<dyn Mailer>;

fn confirmation_body(code: &str) -> String {
    format!("Your confirmation code: {code}")
}

const CONFIRMATION_SUBJECT: &str = "Confirmation code";

// --- SMTP (deployments) ---

/// SmtpMailer
///
/// Sends plain-text mail through an SMTP relay using STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, from_address: &str) -> Result<Self, MailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port);

        if let (Some(user), Some(password)) = (&config.user, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from_address: from_address.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_confirmation_code(&self, email: &str, code: &str) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from_address.parse()?)
            .to(email.parse()?)
            .subject(CONFIRMATION_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(confirmation_body(code))
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport.send(message).await?;
        tracing::info!(to = email, "confirmation code sent");
        Ok(())
    }
}

// --- Console (local development) ---

/// LogMailer
///
/// Writes the message to the log instead of sending it. Only wired up in `Env::Local`
/// when no SMTP relay is configured.
pub struct LogMailer {
    from_address: String,
}

impl LogMailer {
    pub fn new(from_address: &str) -> Self {
        Self {
            from_address: from_address.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_confirmation_code(&self, email: &str, code: &str) -> Result<(), MailError> {
        tracing::info!(
            from = %self.from_address,
            to = email,
            subject = CONFIRMATION_SUBJECT,
            body = %confirmation_body(code),
            "outgoing mail (console backend)"
        );
        Ok(())
    }
}

// --- Mock (tests) ---

/// SentMail
///
/// A message captured by the mock mailer.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMail {
    pub to: String,
    pub code: String,
}

/// MockMailer
///
/// Records every message instead of delivering it, so tests can read back the code that
/// a user would have received.
#[derive(Clone, Default)]
pub struct MockMailer {
    /// When true, every delivery fails.
    pub should_fail: bool,
    outbox: Arc<Mutex<Vec<SentMail>>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Everything delivered so far, oldest first.
    pub fn sent(&self) -> Vec<SentMail> {
        self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
    }

    /// The most recent code delivered to `email`.
    pub fn last_code_for(&self, email: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|mail| mail.to == email)
            .map(|mail| mail.code)
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send_confirmation_code(&self, email: &str, code: &str) -> Result<(), MailError> {
        if self.should_fail {
            return Err(MailError::Delivery(
                "Mock Mailer Error: Simulation requested".to_string(),
            ));
        }
        let mut outbox = self
            .outbox
            .lock()
            .map_err(|e| MailError::Delivery(e.to_string()))?;
        outbox.push(SentMail {
            to: email.to_string(),
            code: code.to_string(),
        });
        Ok(())
    }
}
