use crate::config::MailConfig;
use crate::error::{AppError, AppResult};
use reqwest::Client;

#[derive(Debug, Clone)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl MailMessage {
    pub fn verification(to: &str, link: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Verify your email".to_string(),
            text: format!("Please verify your email by opening the following link: {link}"),
            html: format!(
                "<p>Please verify your email by clicking the link below:</p><p><a href=\"{link}\">Verify email</a></p>"
            ),
        }
    }

    pub fn password_reset(to: &str, link: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Password reset".to_string(),
            text: format!(
                "You requested a password reset. Open the following link within 1 hour: {link}"
            ),
            html: format!(
                "<p>You requested a password reset.</p><p><a href=\"{link}\">Reset password</a></p><p>The link expires in 1 hour.</p>"
            ),
        }
    }
}

/// HTTP 邮件接口 (Mailgun 兼容: POST {base}/messages, basic auth "api")
#[derive(Clone)]
pub struct MailService {
    client: Client,
    config: MailConfig,
}

impl MailService {
    pub fn new(config: MailConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.config.api_key.is_empty() && !self.config.api_base_url.is_empty()
    }

    pub async fn send(&self, message: &MailMessage) -> AppResult<()> {
        if !self.is_enabled() {
            log::info!(
                "Mail disabled, skipping \"{}\" to {}",
                message.subject,
                message.to
            );
            return Ok(());
        }

        let url = format!("{}/messages", self.config.api_base_url.trim_end_matches('/'));
        let params = [
            ("from", self.config.from_address.as_str()),
            ("to", message.to.as_str()),
            ("subject", message.subject.as_str()),
            ("text", message.text.as_str()),
            ("html", message.html.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth("api", Some(&self.config.api_key))
            .form(&params)
            .send()
            .await?;

        if response.status().is_success() {
            log::info!("Mail sent successfully: {}", message.to);
            Ok(())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("Mail failed to send: {}, Error: {}", message.to, error_text);
            Err(AppError::ExternalApiError(format!(
                "Mail sending failed: {error_text}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_contain_link() {
        let msg = MailMessage::verification("a@b.co", "http://x/verify-email/tok");
        assert!(msg.text.contains("http://x/verify-email/tok"));
        assert!(msg.html.contains("href=\"http://x/verify-email/tok\""));

        let msg = MailMessage::password_reset("a@b.co", "http://x/reset-password/tok");
        assert_eq!(msg.to, "a@b.co");
        assert!(msg.text.contains("1 hour"));
    }

    #[actix_web::test]
    async fn test_disabled_mail_is_noop() {
        let service = MailService::new(MailConfig::default());
        assert!(!service.is_enabled());
        let msg = MailMessage::verification("a@b.co", "http://x");
        assert!(service.send(&msg).await.is_ok());
    }
}
