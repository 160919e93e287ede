//! Outgoing email.
//!
//! Composes the notification emails and hands them to a [`MailSender`].
//! Delivery failures are reported to the caller, which logs them; they never
//! reach an HTTP response.

use async_trait::async_trait;
use carpool_common::{AppError, AppResult, config::MailConfig};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
};
use std::sync::Arc;

/// A composed email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub recipients: Vec<String>,
}

/// Trait for delivering composed emails.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send_email(&self, email: &OutgoingEmail) -> AppResult<()>;
}

/// Shared handle to a mail sender.
pub type MailService = Arc<dyn MailSender>;

/// SMTP delivery through lettre.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build a STARTTLS relay transport from configuration.
    pub fn new(config: &MailConfig) -> AppResult<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| AppError::Config(format!("Invalid SMTP relay: {e}")))?
            .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = format!("{} <{}>", config.from_name, config.from_address)
            .parse::<Mailbox>()
            .map_err(|e| AppError::Config(format!("Invalid sender address: {e}")))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl MailSender for SmtpMailer {
    async fn send_email(&self, email: &OutgoingEmail) -> AppResult<()> {
        if email.recipients.is_empty() {
            return Ok(());
        }

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(email.subject.clone());

        for recipient in &email.recipients {
            let mailbox = recipient
                .parse::<Mailbox>()
                .map_err(|e| AppError::BadRequest(format!("Invalid recipient {recipient}: {e}")))?;
            builder = builder.to(mailbox);
        }

        let message = builder
            .multipart(MultiPart::alternative_plain_html(
                email.text_body.clone(),
                email.html_body.clone(),
            ))
            .map_err(|e| AppError::Internal(format!("Failed to build email: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::ExternalService(format!("SMTP send failed: {e}")))?;

        tracing::debug!(
            subject = %email.subject,
            recipients = email.recipients.len(),
            "Sent email via SMTP"
        );

        Ok(())
    }
}

/// Email for a recipient who has unread chat messages in a carpool.
#[must_use]
pub fn chat_escalation_email(
    recipient_email: &str,
    recipient_first_name: &str,
    activity_name: &str,
    unread: u64,
    app_url: &str,
) -> OutgoingEmail {
    let link = format!("{}/notifications", app_url.trim_end_matches('/'));
    let html_name = html_escape(recipient_first_name);
    let html_activity = html_escape(activity_name);
    let html_link = html_escape(&link);

    OutgoingEmail {
        subject: format!("Olästa meddelanden i samåkningen till {activity_name}"),
        text_body: format!(
            "Hej {recipient_first_name},\n\nDu har {unread} olästa meddelanden i samåkningen till {activity_name}.\n\nLäs dem här: {link}\n\nHälsningar, Redo-supporten."
        ),
        html_body: wrap_html(
            &format!(
                "<p>Hej {html_name},</p>\
                 <p>Du har {unread} olästa meddelanden i samåkningen till <strong>{html_activity}</strong>.</p>\
                 <p><a href=\"{html_link}\">Läs meddelandena</a></p>\
                 <p>Hälsningar, Redo-supporten.</p>"
            ),
            app_url,
        ),
        recipients: vec![recipient_email.to_string()],
    }
}

/// Email to a driver whose passenger list changed.
#[must_use]
pub fn passenger_change_email(
    driver_email: &str,
    driver_first_name: &str,
    actor_name: &str,
    added: bool,
    carpool_id: &str,
    app_url: &str,
) -> OutgoingEmail {
    let (subject, line) = if added {
        (
            format!("Ny passagerare i din samåkning {carpool_id}"),
            format!("En ny passagerare har lagts till i din samåkning av {actor_name}."),
        )
    } else {
        (
            format!("Passagerare borttagen från din samåkning {carpool_id}"),
            format!("En passagerare har tagits bort från din samåkning av {actor_name}."),
        )
    };

    let html_name = html_escape(driver_first_name);
    let html_line = html_escape(&line);

    OutgoingEmail {
        subject,
        text_body: format!("Hej {driver_first_name},\n\n{line}\n\nHälsningar, Redo-supporten."),
        html_body: wrap_html(
            &format!(
                "<p>Hej {html_name},</p><p>{html_line}</p><p>Hälsningar, Redo-supporten.</p>"
            ),
            app_url,
        ),
        recipients: vec![driver_email.to_string()],
    }
}

/// Escape user-provided text for an HTML body.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn wrap_html(content: &str, app_url: &str) -> String {
    let app_url = html_escape(app_url);
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px; }}
        a {{ color: #007bff; }}
    </style>
</head>
<body>
    {content}
    <hr style="margin-top: 40px; border: none; border-top: 1px solid #e9ecef;">
    <p style="font-size: 12px; color: #6c757d;">
        Det här mejlet skickades från <a href="{app_url}">{app_url}</a>.<br>
        Du kan ändra dina notisinställningar under din profil.
    </p>
</body>
</html>"#
    )
}
