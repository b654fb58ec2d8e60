//! Transactional email: one-time codes, invitations, submission notices.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::EmailProviderConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("email provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("email provider rejected the message (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

// ─── HTTP provider ──────────────────────────────────────────────────────────

pub const MAIL_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts `{from, to, subject, text, html}` as JSON with a bearer key.
pub struct HttpMailer {
    client: reqwest::Client,
    config: EmailProviderConfig,
}

impl HttpMailer {
    pub fn new(config: EmailProviderConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }
}

#[derive(Serialize)]
struct ProviderPayload<'a> {
    from: &'a str,
    #[serde(flatten)]
    email: &'a Email,
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let resp = self
            .client
            .post(&self.config.url)
            .bearer_auth(&self.config.api_key)
            .json(&ProviderPayload {
                from: &self.config.from,
                email,
            })
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            tracing::debug!(to = %email.to, subject = %email.subject, "email sent");
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(MailError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

// ─── Log-only fallback ──────────────────────────────────────────────────────

const LOG_MAILER_HISTORY: usize = 100;

/// Used when no provider is configured. Logs each message and keeps the most
/// recent ones in memory so local setups can still read login codes.
#[derive(Default)]
pub struct LogMailer {
    sent: Mutex<Vec<Email>>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages "sent" so far, oldest first.
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "email (not delivered):\n{}",
            email.text
        );
        if let Ok(mut sent) = self.sent.lock() {
            if sent.len() >= LOG_MAILER_HISTORY {
                sent.remove(0);
            }
            sent.push(email.clone());
        }
        Ok(())
    }
}

// ─── Message builders ───────────────────────────────────────────────────────

pub fn otp_email(to: &str, code: &str, ttl_minutes: u64) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("Your Tinta login code: {code}"),
        text: format!(
            "Your login code is {code}.\n\nIt expires in {ttl_minutes} minutes. \
             If you did not try to sign in, you can ignore this email."
        ),
        html: format!(
            "<p>Your login code is <strong>{}</strong>.</p>\
             <p>It expires in {ttl_minutes} minutes. If you did not try to sign in, \
             you can ignore this email.</p>",
            escape_html(code)
        ),
    }
}

pub fn invitation_email(to: &str, workspace_name: &str, inviter: &str, url: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("You've been invited to {workspace_name} on Tinta"),
        text: format!(
            "{inviter} invited you to join the workspace \"{workspace_name}\".\n\n\
             Accept the invitation: {url}"
        ),
        html: format!(
            "<p>{} invited you to join the workspace <strong>{}</strong>.</p>\
             <p><a href=\"{}\">Accept the invitation</a></p>",
            escape_html(inviter),
            escape_html(workspace_name),
            escape_html(url)
        ),
    }
}

/// `answers` are `(label, rendered value)` pairs in form order.
pub fn submission_email(
    to: &str,
    form_title: &str,
    answers: &[(String, String)],
    response_url: &str,
) -> Email {
    let text_lines: String = answers
        .iter()
        .map(|(label, value)| format!("{label}: {value}\n"))
        .collect();
    let html_rows: String = answers
        .iter()
        .map(|(label, value)| {
            format!(
                "<tr><th align=\"left\">{}</th><td>{}</td></tr>",
                escape_html(label),
                escape_html(value)
            )
        })
        .collect();
    Email {
        to: to.to_string(),
        subject: format!("New response to {form_title}"),
        text: format!(
            "A new response was submitted to \"{form_title}\".\n\n{text_lines}\n{response_url}"
        ),
        html: format!(
            "<p>A new response was submitted to <strong>{}</strong>.</p>\
             <table>{html_rows}</table><p><a href=\"{}\">View response</a></p>",
            escape_html(form_title),
            escape_html(response_url)
        ),
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_with_timeout(server: &MockServer, timeout: Duration) -> HttpMailer {
        let config = EmailProviderConfig {
            url: format!("{}/send", server.uri()),
            api_key: "key-123".into(),
            from: "no-reply@tinta.agency".into(),
        };
        HttpMailer::new(config, timeout).unwrap()
    }

    fn provider(server: &MockServer) -> HttpMailer {
        provider_with_timeout(server, MAIL_TIMEOUT)
    }

    #[tokio::test]
    async fn test_http_mailer_posts_json_with_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("authorization", "Bearer key-123"))
            .and(body_partial_json(serde_json::json!({
                "from": "no-reply@tinta.agency",
                "to": "ada@example.com",
                "subject": "Your Tinta login code: 123456",
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        provider(&server)
            .send(&otp_email("ada@example.com", "123456", 10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_http_mailer_surfaces_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad recipient"))
            .mount(&server)
            .await;

        let err = provider(&server)
            .send(&otp_email("x@example.com", "000000", 10))
            .await
            .unwrap_err();
        match err {
            MailError::Rejected { status, body } => {
                assert_eq!(status, 422);
                assert_eq!(body, "bad recipient");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_http_mailer_gives_up_on_slow_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let started = std::time::Instant::now();
        let err = provider_with_timeout(&server, Duration::from_millis(100))
            .send(&otp_email("ada@example.com", "123456", 10))
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::Transport(ref e) if e.is_timeout()), "{err}");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_log_mailer_keeps_recent_history() {
        let mailer = LogMailer::new();
        for i in 0..(LOG_MAILER_HISTORY + 5) {
            mailer
                .send(&otp_email(&format!("u{i}@example.com"), "111111", 10))
                .await
                .unwrap();
        }
        let sent = mailer.sent();
        assert_eq!(sent.len(), LOG_MAILER_HISTORY);
        assert_eq!(sent[0].to, "u5@example.com");
    }

    #[test]
    fn test_builders_escape_html() {
        let email = invitation_email(
            "bob@example.com",
            "<script>Acme</script>",
            "Ada & Co",
            "https://tinta.agency/invite/t",
        );
        assert!(email.html.contains("&lt;script&gt;Acme&lt;/script&gt;"));
        assert!(email.html.contains("Ada &amp; Co"));
        assert!(email.text.contains("https://tinta.agency/invite/t"));

        let email = submission_email(
            "admin@example.com",
            "Contact",
            &[("Name".into(), "<b>Eve</b>".into())],
            "https://tinta.agency/r/1",
        );
        assert!(email.html.contains("&lt;b&gt;Eve&lt;/b&gt;"));
        assert!(email.text.contains("Name: <b>Eve</b>"));
    }
}
