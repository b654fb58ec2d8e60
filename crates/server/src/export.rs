//! Response export: a printable HTML document, and PDF via an external
//! HTML→PDF renderer.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use tinta_api::{FieldDescriptor, FieldKind, ResponseDetail};

use crate::mail::escape_html;

// ─── HTML ───────────────────────────────────────────────────────────────────

/// Human-readable rendering of one answer.
pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(true)) => "Yes".into(),
        Some(Value::Bool(false)) => "No".into(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| display_value(Some(v)))
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => other.to_string(),
    }
}

/// `(label, value)` pairs in form order. File fields list their attachment
/// names; answers to fields no longer in the form are appended by key.
pub fn answer_rows(fields: &[FieldDescriptor], detail: &ResponseDetail) -> Vec<(String, String)> {
    let mut rows: Vec<(String, String)> = fields
        .iter()
        .map(|field| {
            let value = if field.kind == FieldKind::File {
                detail
                    .files
                    .iter()
                    .filter(|f| f.field_id == field.id)
                    .map(|f| f.file_name.clone())
                    .collect::<Vec<_>>()
                    .join(", ")
            } else {
                display_value(detail.data.get(&field.id))
            };
            (field.label.clone(), value)
        })
        .collect();

    if let Some(data) = detail.data.as_object() {
        for (key, value) in data {
            if !fields.iter().any(|f| &f.id == key) {
                rows.push((key.clone(), display_value(Some(value))));
            }
        }
    }
    rows
}

pub fn render_response_html(fields: &[FieldDescriptor], detail: &ResponseDetail) -> String {
    let rows: String = answer_rows(fields, detail)
        .iter()
        .map(|(label, value)| {
            format!(
                "<tr><th>{}</th><td>{}</td></tr>\n",
                escape_html(label),
                escape_html(value)
            )
        })
        .collect();

    let respondent = detail
        .respondent_email
        .as_deref()
        .map(|e| format!("<p class=\"meta\">Respondent: {}</p>\n", escape_html(e)))
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">\
         <title>{title}</title>\
         <style>body{{font-family:sans-serif;margin:2em}}th{{text-align:left;vertical-align:top;\
         padding:4px 12px 4px 0}}td{{padding:4px 0;white-space:pre-wrap}}.meta{{color:#666}}</style>\
         </head><body>\n<h1>{title}</h1>\n\
         <p class=\"meta\">Submitted {submitted} · Status: {status}</p>\n{respondent}\
         <table>\n{rows}</table>\n</body></html>\n",
        title = escape_html(&detail.form_title),
        submitted = escape_html(&detail.created_at),
        status = detail.status,
    )
}

// ─── PDF ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("PDF renderer unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("PDF renderer returned HTTP {0}")]
    Status(u16),
}

impl ExportError {
    /// Transport failures and 5xx are transient; 4xx means the request itself
    /// is wrong.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status(code) => *code >= 500,
        }
    }
}

/// Per-request limit for the renderer; a hung renderer becomes a retryable
/// transport error.
pub const RENDER_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// `base * 2^attempt`, capped at [`MAX_BACKOFF`].
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    2u32.checked_pow(attempt)
        .map_or(MAX_BACKOFF, |factor| base.saturating_mul(factor))
        .min(MAX_BACKOFF)
}

/// Run `op` up to `attempts` times, sleeping `base * 2^n` (capped) between
/// retryable failures.
pub async fn with_backoff<T, F, Fut>(
    attempts: u32,
    base: Duration,
    mut op: F,
) -> Result<T, ExportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExportError>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                let delay = backoff_delay(base, attempt);
                warn!(
                    "PDF render attempt {}/{} failed ({}), retrying in {}ms...",
                    attempt + 1,
                    attempts,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Posts an HTML document to the renderer and returns the PDF bytes.
#[derive(Clone)]
pub struct PdfRenderer {
    client: reqwest::Client,
    url: String,
    attempts: u32,
    base_delay: Duration,
}

impl PdfRenderer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            attempts: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    pub fn with_backoff(mut self, attempts: u32, base_delay: Duration) -> Self {
        self.attempts = attempts;
        self.base_delay = base_delay;
        self
    }

    pub async fn render(&self, html: &str) -> Result<Vec<u8>, ExportError> {
        with_backoff(self.attempts, self.base_delay, || self.render_once(html)).await
    }

    async fn render_once(&self, html: &str) -> Result<Vec<u8>, ExportError> {
        let resp = self
            .client
            .post(&self.url)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(html.to_string())
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ExportError::Status(status.as_u16()));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinta_api::{ResponseFileInfo, ResponseStatus};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn detail() -> ResponseDetail {
        ResponseDetail {
            id: "r1".into(),
            form_id: "f1".into(),
            form_title: "Contact <us>".into(),
            workspace_id: "w1".into(),
            status: ResponseStatus::New,
            respondent_email: Some("eve@example.com".into()),
            data: serde_json::json!({
                "name": "Eve",
                "topic": "sales",
                "legacy": "kept",
            }),
            metadata: serde_json::json!({}),
            files: vec![ResponseFileInfo {
                id: "file1".into(),
                field_id: "resume".into(),
                file_name: "cv.pdf".into(),
                content_type: "application/pdf".into(),
                size_bytes: 10,
                download_url: "/api/responses/r1/files/file1".into(),
            }],
            created_at: "2025-01-01 10:00:00".into(),
            updated_at: "2025-01-01 10:00:00".into(),
        }
    }

    fn renderer_with_timeout(server: &MockServer, timeout: Duration) -> PdfRenderer {
        PdfRenderer::new(format!("{}/render", server.uri()), timeout)
            .unwrap()
            .with_backoff(3, Duration::from_millis(1))
    }

    fn renderer(server: &MockServer) -> PdfRenderer {
        renderer_with_timeout(server, RENDER_TIMEOUT)
    }

    #[test]
    fn test_answer_rows_follow_form_order() {
        let schema = tinta_core::testing::contact_schema();
        let rows = answer_rows(schema.fields(), &detail());
        let labels: Vec<&str> = rows.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(
            labels,
            ["Full name", "Email", "Topic", "Message", "Resume", "legacy"]
        );
        assert_eq!(rows[4].1, "cv.pdf");
        assert_eq!(rows[1].1, "");
    }

    #[test]
    fn test_html_is_escaped() {
        let schema = tinta_core::testing::contact_schema();
        let html = render_response_html(schema.fields(), &detail());
        assert!(html.contains("<h1>Contact &lt;us&gt;</h1>"));
        assert!(html.contains("Respondent: eve@example.com"));
        assert!(html.contains("Status: new"));
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(Some(&serde_json::json!(["a", "b"]))), "a, b");
        assert_eq!(display_value(Some(&serde_json::json!(true))), "Yes");
        assert_eq!(display_value(Some(&serde_json::json!(4.5))), "4.5");
        assert_eq!(display_value(None), "");
    }

    #[tokio::test]
    async fn test_retries_server_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/render"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/render"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let pdf = renderer(&server).render("<p>hi</p>").await.unwrap();
        assert_eq!(pdf, b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_gives_up_after_three_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let err = renderer(&server).render("<p>hi</p>").await.unwrap_err();
        assert!(matches!(err, ExportError::Status(500)));
    }

    #[tokio::test]
    async fn test_hung_renderer_times_out_and_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/render"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"%PDF-1.7".to_vec())
                    .set_delay(Duration::from_secs(5)),
            )
            .expect(3)
            .mount(&server)
            .await;

        let started = std::time::Instant::now();
        let err = renderer_with_timeout(&server, Duration::from_millis(100))
            .render("<p>hi</p>")
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Transport(ref e) if e.is_timeout()), "{err}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let err = renderer(&server).render("<p>hi</p>").await.unwrap_err();
        assert!(matches!(err, ExportError::Status(400)));
    }

    #[tokio::test]
    async fn test_backoff_delays_grow_exponentially() {
        let started = tokio::time::Instant::now();
        let mut calls = 0;
        let result: Result<(), _> = with_backoff(3, Duration::from_millis(20), || {
            calls += 1;
            async { Err(ExportError::Status(502)) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 3);
        // 20ms + 40ms
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_backoff_delay_is_capped() {
        let base = Duration::from_millis(20);
        assert_eq!(backoff_delay(base, 0), base);
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(160));
        assert_eq!(backoff_delay(base, 31), MAX_BACKOFF);
        assert_eq!(backoff_delay(base, 40), MAX_BACKOFF);
        assert_eq!(backoff_delay(Duration::MAX, 1), MAX_BACKOFF);
    }

    #[tokio::test(start_paused = true)]
    async fn test_many_attempts_do_not_overflow() {
        let mut calls = 0u32;
        let result = with_backoff(u32::MAX, Duration::from_secs(1), || {
            calls += 1;
            let n = calls;
            async move {
                if n > 40 {
                    Ok(n)
                } else {
                    Err(ExportError::Status(503))
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 41);
    }
}
