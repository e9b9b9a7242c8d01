//! Outbound mail: a narrow transport capability plus the SMTP
//! implementation used in production. The dispatcher only sees the trait,
//! so tests substitute a recording stub.

use std::fs;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{info, warn};

use crate::error::Result;
use crate::model::OutgoingMessage;

/// Capability the orchestrator needs from a mail system: a single attempt
/// per message, reported as success or failure.
pub trait MailTransport {
    fn send(&mut self, message: &OutgoingMessage) -> bool;
}

/// Stand-in transport for modes that never send. Dispatch in preview mode
/// must not touch a transport at all; this makes any accidental call
/// visible in the logs.
pub struct NullTransport;

impl MailTransport for NullTransport {
    fn send(&mut self, message: &OutgoingMessage) -> bool {
        warn!(to = %message.to, "null transport invoked; message dropped");
        false
    }
}

/// SMTP connection settings, built from environment variables. Returns
/// `None` when `ERF_SMTP_HOST` is not set (transport unavailable).
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender: String,
}

impl SmtpConfig {
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("ERF_SMTP_HOST").ok()?;

        let port: u16 = std::env::var("ERF_SMTP_PORT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("ERF_SMTP_USERNAME").unwrap_or_default();
        let password = std::env::var("ERF_SMTP_PASSWORD").unwrap_or_default();
        let sender =
            std::env::var("ERF_SENDER_ADDRESS").unwrap_or_else(|_| username.clone());

        Some(Self {
            host,
            port,
            username,
            password,
            sender,
        })
    }
}

/// Blocking SMTP mailer.
pub struct SmtpMailer {
    transport: SmtpTransport,
    sender: Mailbox,
}

impl SmtpMailer {
    /// Builds the relay transport. Fails early on unusable configuration
    /// rather than on the first send.
    pub fn connect(config: &SmtpConfig) -> Result<Self> {
        let sender: Mailbox = config.sender.parse()?;
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let transport = SmtpTransport::relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self { transport, sender })
    }

    fn build_message(&self, message: &OutgoingMessage) -> Option<Message> {
        let to: Mailbox = match message.to.parse() {
            Ok(mailbox) => mailbox,
            Err(error) => {
                warn!(to = %message.to, %error, "invalid recipient address");
                return None;
            }
        };

        let mut builder = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(&message.subject);

        for cc in &message.cc {
            match cc.parse::<Mailbox>() {
                Ok(mailbox) => builder = builder.cc(mailbox),
                Err(error) => warn!(cc = %cc, %error, "skipping invalid cc address"),
            }
        }

        let html = SinglePart::builder()
            .header(ContentType::TEXT_HTML)
            .body(message.html_body.clone());

        let built = if message.attachments.is_empty() {
            builder.singlepart(html)
        } else {
            let mut parts = MultiPart::mixed().singlepart(html);
            for path in &message.attachments {
                let bytes = match fs::read(path) {
                    Ok(bytes) => bytes,
                    Err(error) => {
                        warn!(path = %path.display(), %error, "skipping unreadable attachment");
                        continue;
                    }
                };
                let filename = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "attachment".to_string());
                let Ok(content_type) = ContentType::parse("application/octet-stream") else {
                    continue;
                };
                parts = parts.singlepart(Attachment::new(filename).body(bytes, content_type));
            }
            builder.multipart(parts)
        };

        match built {
            Ok(message) => Some(message),
            Err(error) => {
                warn!(%error, "failed to build message");
                None
            }
        }
    }
}

impl MailTransport for SmtpMailer {
    fn send(&mut self, message: &OutgoingMessage) -> bool {
        let Some(email) = self.build_message(message) else {
            return false;
        };

        match self.transport.send(&email) {
            Ok(_) => {
                info!(to = %message.to, subject = %message.subject, "message sent");
                true
            }
            Err(error) => {
                warn!(to = %message.to, %error, "message send failed");
                false
            }
        }
    }
}
