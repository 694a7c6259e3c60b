//! Outbound email for verification codes

use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};
use serde::Serialize;

use crate::{
    config::{EmailConfig, MailTransportKind},
    error::{AppError, AppResult},
    models::CodePurpose,
};

/// A rendered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Delivery backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> AppResult<()>;
}

fn from_header(config: &EmailConfig) -> String {
    match config.from_name.as_deref() {
        Some(name) if !name.trim().is_empty() => format!("{} <{}>", name.trim(), config.from),
        _ => config.from.clone(),
    }
}

/// SMTP relay via lettre
pub struct SmtpMailer {
    config: EmailConfig,
}

impl SmtpMailer {
    fn build_message(&self, email: &OutgoingEmail) -> AppResult<Message> {
        let from_mailbox = Mailbox::from_str(&from_header(&self.config))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let to_mailbox = Mailbox::from_str(&email.to)
            .map_err(|e| AppError::Internal(format!("Invalid to address: {}", e)))?;

        Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(email.subject.clone())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html.clone()),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }

    fn transport(&self) -> AppResult<SmtpTransport> {
        let builder = if self.config.smtp_use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        }
        .port(self.config.smtp_port);

        let builder = match (&self.config.smtp_username, &self.config.smtp_password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(builder.build())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> AppResult<()> {
        let message = self.build_message(email)?;
        let transport = self.transport()?;

        // lettre's SmtpTransport blocks
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| AppError::Internal(format!("Email task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Failed to send email: {}", e)))?;

        Ok(())
    }
}

/// Resend HTTP API
pub struct ResendMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &OutgoingEmail) -> AppResult<()> {
        let payload = ResendPayload {
            from: &self.from,
            to: [email.to.as_str()],
            subject: &email.subject,
            html: &email.html,
            text: &email.text,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Email API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Email API returned {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}

/// Writes messages to the log instead of delivering them
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> AppResult<()> {
        tracing::info!("Email to {}: {}\n{}", email.to, email.subject, email.text);
        Ok(())
    }
}

/// Select the backend named by configuration
pub fn build_mailer(config: &EmailConfig) -> AppResult<Arc<dyn Mailer>> {
    Ok(match config.transport {
        MailTransportKind::Log => Arc::new(LogMailer),
        MailTransportKind::Smtp => Arc::new(SmtpMailer {
            config: config.clone(),
        }),
        MailTransportKind::Resend => {
            let api_key = config
                .resend_api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| {
                    AppError::Internal("email.resend_api_key is required for the resend transport".to_string())
                })?;
            Arc::new(ResendMailer {
                client: reqwest::Client::new(),
                api_url: config.resend_api_url.clone(),
                api_key,
                from: from_header(config),
            })
        }
    })
}

#[derive(Clone)]
pub struct EmailService {
    mailer: Arc<dyn Mailer>,
    ttl_minutes: i64,
}

impl EmailService {
    pub fn new(mailer: Arc<dyn Mailer>, ttl_minutes: i64) -> Self {
        Self { mailer, ttl_minutes }
    }

    /// Render the verification code message for a purpose
    pub fn render_code(&self, to: &str, code: &str, purpose: CodePurpose) -> OutgoingEmail {
        let (subject, intro) = match purpose {
            CodePurpose::Register => (
                "Your Bookshelf registration code",
                "Use this code to finish creating your account.",
            ),
            CodePurpose::Forget => (
                "Your Bookshelf password reset code",
                "Use this code to reset your password.",
            ),
        };

        let text = format!(
            "{intro}\n\nYour verification code is: {code}\n\nThis code will expire in {ttl} minutes.\n\nIf you didn't request this code, please ignore this email.\n",
            intro = intro,
            code = code,
            ttl = self.ttl_minutes
        );
        let html = format!(
            "<html><body><p>{intro}</p><p>Your verification code is: <strong>{code}</strong></p>\
             <p>This code will expire in {ttl} minutes.</p>\
             <p>If you didn't request this code, please ignore this email.</p></body></html>",
            intro = intro,
            code = code,
            ttl = self.ttl_minutes
        );

        OutgoingEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            text,
            html,
        }
    }

    /// Send a verification code
    pub async fn send_code(&self, to: &str, code: &str, purpose: CodePurpose) -> AppResult<()> {
        self.mailer.send(&self.render_code(to, code, purpose)).await
    }

    /// Send in the background; a failure is only logged and the code stays valid
    pub fn dispatch_code(&self, to: String, code: String, purpose: CodePurpose) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.send_code(&to, &code, purpose).await {
                tracing::warn!("Failed to send {} code to {}: {}", purpose, to, e);
            }
        });
    }
}
