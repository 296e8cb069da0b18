use axum::async_trait;
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;

/// Outbound mail seam. Only the password-reset flow sends mail; delivery
/// failures are logged by the caller and never change the HTTP response.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_reset_email(&self, to: &str, reset_link: &str) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_reset_email(&self, to: &str, reset_link: &str) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.parse()?)
            .to(to.parse()?)
            .subject("Password Reset Request")
            .header(ContentType::TEXT_HTML)
            .body(reset_email_body(reset_link))?;
        self.transport.send(message).await?;
        Ok(())
    }
}

fn reset_email_body(reset_link: &str) -> String {
    format!(
        "<h1>Password Reset Request</h1>\
         <p>You requested a password reset. Click the link below to reset your password:</p>\
         <p><a href=\"{link}\">{link}</a></p>\
         <p>This link will expire in 1 hour.</p>\
         <p>If you didn't request this, please ignore this email.</p>",
        link = reset_link
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_embeds_the_reset_link() {
        let body = reset_email_body("https://app.local/reset-password?token=abc");
        assert!(body.contains("https://app.local/reset-password?token=abc"));
        assert!(body.contains("expire in 1 hour"));
    }
}
