//! Password reset emails.
//!
//! Reset codes are delivered over SMTP using the `[email]` section of the
//! config file. The [`ResetMailer`] trait lets the API be exercised without a
//! mail server.

use anyhow::Result;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;
use crate::db::RESET_CODE_TTL_MINUTES;

/// Delivers password reset codes
#[async_trait]
pub trait ResetMailer: Send + Sync {
    async fn send_reset_code(&self, to_email: &str, username: &str, code: &str) -> Result<()>;
}

/// Sends reset codes through the configured SMTP relay
pub struct SmtpMailer {
    config: EmailConfig,
}

impl SmtpMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Check if email sending is configured
    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    /// Send an email with HTML and plain text versions
    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<()> {
        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        let from: Mailbox = format!("{} <{}>", self.config.from_name, from_address).parse()?;
        let to: Mailbox = to_email.parse()?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        let mailer = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer
        };

        mailer.build().send(email).await?;

        tracing::info!(to = %to_email, subject = %subject, "Email sent");
        Ok(())
    }
}

#[async_trait]
impl ResetMailer for SmtpMailer {
    async fn send_reset_code(&self, to_email: &str, username: &str, code: &str) -> Result<()> {
        if !self.is_enabled() {
            anyhow::bail!("email delivery is not configured");
        }

        let subject = "Your Nyx password reset code";
        let html_body = render_reset_html(username, code, RESET_CODE_TTL_MINUTES);
        let text_body = render_reset_text(username, code, RESET_CODE_TTL_MINUTES);

        self.send_email(to_email, subject, &html_body, &text_body)
            .await
    }
}

fn render_reset_html(username: &str, code: &str, expires_in_minutes: i64) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Password Reset</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Arial, sans-serif;
            margin: 0;
            padding: 0;
            background-color: #0f172a;
        }}
        .container {{
            max-width: 520px;
            margin: 0 auto;
            padding: 40px 20px;
        }}
        .card {{
            background-color: #1e293b;
            color: #e2e8f0;
            border-radius: 8px;
            padding: 32px 24px;
        }}
        .code {{
            font-size: 32px;
            letter-spacing: 8px;
            font-weight: 700;
            text-align: center;
            background-color: #334155;
            border-radius: 6px;
            padding: 16px;
            margin: 24px 0;
        }}
        .muted {{
            color: #94a3b8;
            font-size: 13px;
        }}
    </style>
</head>
<body>
    <div class="container">
        <div class="card">
            <p>Hi {username},</p>
            <p>Use this code to reset your Nyx password:</p>
            <div class="code">{code}</div>
            <p>The code expires in {expires_in_minutes} minutes.</p>
            <p class="muted">If you didn't ask for a password reset, you can ignore this email.</p>
        </div>
    </div>
</body>
</html>"#,
        username = html_escape(username),
        code = html_escape(code),
        expires_in_minutes = expires_in_minutes,
    )
}

fn render_reset_text(username: &str, code: &str, expires_in_minutes: i64) -> String {
    format!(
        r#"Hi {username},

Use this code to reset your Nyx password:

    {code}

The code expires in {expires_in_minutes} minutes.

If you didn't ask for a password reset, you can ignore this email."#
    )
}

/// Escape HTML special characters
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<script>"), "&lt;script&gt;");
        assert_eq!(html_escape("Tom & Jerry"), "Tom &amp; Jerry");
        assert_eq!(html_escape("it's"), "it&#39;s");
    }

    #[test]
    fn test_render_reset_text() {
        let text = render_reset_text("luna", "042917", 15);
        assert!(text.contains("Hi luna"));
        assert!(text.contains("042917"));
        assert!(text.contains("15 minutes"));
    }

    #[test]
    fn test_render_reset_html_escapes_username() {
        let html = render_reset_html("<luna>", "042917", 15);
        assert!(html.contains("&lt;luna&gt;"));
        assert!(html.contains("042917"));
        assert!(html.contains("15 minutes"));
        assert!(html.contains("<!DOCTYPE html>"));
    }

    #[tokio::test]
    async fn test_unconfigured_mailer_fails() {
        let mailer = SmtpMailer::new(EmailConfig::default());
        assert!(!mailer.is_enabled());
        assert!(mailer
            .send_reset_code("luna@example.com", "luna", "123456")
            .await
            .is_err());
    }
}
