//! Transactional email (password reset links).

use crate::config::MailConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Cannot reach mail provider: {0}")]
    Connection(String),

    #[error("Mail provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError>;
}

/// Mailgun messages API: form POST to `<base>/v3/<domain>/messages` with
/// basic auth `api:<key>`.
pub struct MailgunMailer {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl MailgunMailer {
    pub fn new(config: &MailConfig, timeout_secs: u64) -> Result<Self, MailError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| MailError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/v3/{}/messages",
                config.api_url.trim_end_matches('/'),
                config.domain
            ),
            api_key: config.api_key.clone(),
            from: config.from.clone(),
        })
    }
}

impl Mailer for MailgunMailer {
    fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        let form = [
            ("from", self.from.as_str()),
            ("to", to),
            ("subject", subject),
            ("html", html),
        ];

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth("api", Some(&self.api_key))
            .form(&form)
            .send()
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    MailError::Connection(e.to_string())
                } else {
                    MailError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(MailError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(subject, "Email sent");
        Ok(())
    }
}

/// Used when no mail provider is configured. Logs recipient and subject,
/// never the body (it carries the reset link).
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, to: &str, subject: &str, _html: &str) -> Result<(), MailError> {
        tracing::warn!(to, subject, "No mail provider configured, email not delivered");
        Ok(())
    }
}

pub const RESET_EMAIL_SUBJECT: &str = "Reset your password";

pub fn reset_email_html(first_name: &str, link: &str, expiry_hours: i64) -> String {
    let unit = if expiry_hours == 1 { "hour" } else { "hours" };
    format!(
        "<html><body>\
         <h2>Password reset</h2>\
         <p>Hello {first_name},</p>\
         <p>We received a request to reset the password for your LabsExplained account. \
         Click the link below to choose a new password:</p>\
         <p><a href=\"{link}\">Reset my password</a></p>\
         <p>This link expires in {expiry_hours} {unit}. If you did not request a reset, \
         you can ignore this email.</p>\
         </body></html>"
    )
}

#[cfg(test)]
pub(crate) mod mock {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone)]
    pub struct SentMail {
        pub to: String,
        pub subject: String,
        pub html: String,
    }

    /// Records every message; optionally fails delivery.
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<SentMail>>,
        pub fail: bool,
    }

    impl RecordingMailer {
        pub fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub fn sent(&self) -> Vec<SentMail> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Mailer for RecordingMailer {
        fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
            if self.fail {
                return Err(MailError::Provider {
                    status: 502,
                    body: "bad gateway".into(),
                });
            }
            self.sent.lock().unwrap().push(SentMail {
                to: to.into(),
                subject: subject.into(),
                html: html.into(),
            });
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_email_contains_name_link_and_expiry() {
        let html = reset_email_html("Ada", "https://x.test/reset-password?token=t", 1);
        assert!(html.contains("Hello Ada"));
        assert!(html.contains("href=\"https://x.test/reset-password?token=t\""));
        assert!(html.contains("1 hour."));
    }

    #[test]
    fn mailgun_endpoint_built_from_config() {
        let config = MailConfig {
            api_url: "https://api.eu.mailgun.net/".into(),
            domain: "mg.example.com".into(),
            api_key: "key".into(),
            from: "LabsExplained <noreply@mg.example.com>".into(),
        };
        let mailer = MailgunMailer::new(&config, 5).unwrap();
        assert_eq!(
            mailer.endpoint,
            "https://api.eu.mailgun.net/v3/mg.example.com/messages"
        );
    }

    #[test]
    fn log_mailer_always_succeeds() {
        assert!(LogMailer.send("a@example.com", "s", "<p>x</p>").is_ok());
    }

    #[test]
    fn unreachable_provider_is_connection_error() {
        let config = MailConfig {
            api_url: "http://127.0.0.1:1".into(),
            domain: "mg.example.com".into(),
            api_key: "key".into(),
            from: "noreply@mg.example.com".into(),
        };
        let mailer = MailgunMailer::new(&config, 2).unwrap();
        let err = mailer.send("a@example.com", "s", "x").unwrap_err();
        assert!(matches!(err, MailError::Connection(_)));
    }
}
