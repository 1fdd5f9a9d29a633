use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::env;

#[derive(Debug, Clone)]
struct SmtpSettings {
    server: String,
    username: String,
    password: String,
    from: String,
    to: String,
}

/// Operator mail over SMTP. Without `SMTP_SERVER` and friends it only logs.
#[derive(Debug, Clone)]
pub struct EmailClient {
    settings: Option<SmtpSettings>,
}

impl Default for EmailClient {
    fn default() -> Self {
        Self::new()
    }
}

impl EmailClient {
    pub fn new() -> Self {
        let read = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());
        let settings = match (
            read("SMTP_SERVER"),
            read("SMTP_USERNAME"),
            read("SMTP_PASSWORD"),
            read("EMAIL_FROM"),
            read("EMAIL_TO"),
        ) {
            (Some(server), Some(username), Some(password), Some(from), Some(to)) => {
                Some(SmtpSettings {
                    server,
                    username,
                    password,
                    from,
                    to,
                })
            }
            _ => None,
        };
        Self { settings }
    }

    pub fn is_configured(&self) -> bool {
        self.settings.is_some()
    }

    /// Returns true when the mail was handed to the SMTP relay.
    pub fn send(&self, subject: &str, body: &str) -> bool {
        let Some(settings) = &self.settings else {
            log::warn!("[ALERT] SMTP not configured, skipping email: {} | {}", subject, body);
            return false;
        };
        match Self::deliver(settings, subject, body) {
            Ok(()) => true,
            Err(e) => {
                log::error!("[ALERT] failed to send email '{}': {}", subject, e);
                false
            }
        }
    }

    fn deliver(settings: &SmtpSettings, subject: &str, body: &str) -> anyhow::Result<()> {
        let from: Mailbox = settings.from.parse()?;
        let to: Mailbox = settings.to.parse()?;
        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        let creds = Credentials::new(settings.username.clone(), settings.password.clone());
        let mailer = SmtpTransport::relay(&settings.server)?
            .credentials(creds)
            .build();
        mailer.send(&email)?;
        Ok(())
    }
}
