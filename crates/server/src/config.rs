//! Server configuration loaded from environment variables.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct EmailProviderConfig {
    pub url: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub base_url: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Lowercased; matching users are promoted on login.
    pub superadmin_emails: Vec<String>,
    pub email: Option<EmailProviderConfig>,
    pub pdf_render_url: Option<String>,
    pub invitation_ttl_days: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            base_url: "http://localhost:3000".into(),
            port: 3000,
            jwt_secret: String::new(),
            superadmin_emails: Vec::new(),
            email: None,
            pdf_render_url: None,
            invitation_ttl_days: 7,
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(non_empty)
    }

    /// Build from any variable source; unset and blank values fall back to
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let email = match (
            lookup("EMAIL_PROVIDER_URL"),
            lookup("EMAIL_API_KEY"),
            lookup("EMAIL_FROM"),
        ) {
            (Some(url), Some(api_key), Some(from)) => {
                Some(EmailProviderConfig { url, api_key, from })
            }
            (None, None, None) => None,
            _ => {
                tracing::warn!(
                    "EMAIL_PROVIDER_URL, EMAIL_API_KEY and EMAIL_FROM must be set together; emails will only be logged"
                );
                None
            }
        };

        Self {
            data_dir: lookup("TINTA_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            base_url: lookup("BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            jwt_secret: lookup("JWT_SECRET").unwrap_or_default(),
            superadmin_emails: lookup("SUPERADMIN_EMAILS")
                .map(|list| {
                    list.split(',')
                        .map(|e| e.trim().to_lowercase())
                        .filter(|e| !e.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            email,
            pdf_render_url: lookup("PDF_RENDER_URL"),
            invitation_ttl_days: lookup("INVITATION_TTL_DAYS")
                .and_then(|d| d.parse().ok())
                .filter(|d| *d > 0)
                .unwrap_or(defaults.invitation_ttl_days),
        }
    }

    pub fn is_superadmin_email(&self, email: &str) -> bool {
        self.superadmin_emails.iter().any(|e| e == email)
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Public link for a form share token.
    pub fn share_url(&self, share_token: &str) -> String {
        format!("{}/f/{share_token}", self.base())
    }

    pub fn invitation_url(&self, token: &str) -> String {
        format!("{}/invite/{token}", self.base())
    }

    /// Public URL of a blob served by `GET /api/blobs/{*key}`.
    pub fn blob_url(&self, key: &str) -> String {
        format!("{}/api/blobs/{key}", self.base())
    }

    pub fn response_url(&self, response_id: &str) -> String {
        format!("{}/api/responses/{response_id}", self.base())
    }

    /// Authenticated download link for a response attachment.
    pub fn response_file_url(&self, response_id: &str, file_id: &str) -> String {
        format!("{}/files/{file_id}", self.response_url(response_id))
    }

    pub fn invitation_ttl_secs(&self) -> u64 {
        self.invitation_ttl_days * 24 * 3600
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| vars.get(k).cloned().filter(|v| !v.trim().is_empty()))
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]);
        assert_eq!(c.base_url, "http://localhost:3000");
        assert_eq!(c.port, 3000);
        assert_eq!(c.invitation_ttl_days, 7);
        assert!(c.email.is_none());
        assert!(c.pdf_render_url.is_none());
        assert_eq!(c.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_overrides() {
        let c = config(&[
            ("BASE_URL", "https://tinta.agency/"),
            ("PORT", "8080"),
            ("SUPERADMIN_EMAILS", " Root@Tinta.agency, ,ops@tinta.agency"),
            ("INVITATION_TTL_DAYS", "3"),
            ("EMAIL_PROVIDER_URL", "https://mail.example/send"),
            ("EMAIL_API_KEY", "k"),
            ("EMAIL_FROM", "Tinta <no-reply@tinta.agency>"),
        ]);
        assert_eq!(c.share_url("abc"), "https://tinta.agency/f/abc");
        assert_eq!(c.invitation_url("t"), "https://tinta.agency/invite/t");
        assert_eq!(c.port, 8080);
        assert!(c.is_superadmin_email("root@tinta.agency"));
        assert_eq!(c.superadmin_emails.len(), 2);
        assert_eq!(c.invitation_ttl_secs(), 3 * 24 * 3600);
        assert_eq!(c.email.unwrap().from, "Tinta <no-reply@tinta.agency>");
    }

    #[test]
    fn test_links_ignore_trailing_slash_on_base_url() {
        let c = AppConfig {
            base_url: "https://forms.example.com/".into(),
            ..Default::default()
        };
        assert_eq!(
            c.blob_url("avatars/a.png"),
            "https://forms.example.com/api/blobs/avatars/a.png"
        );
        assert_eq!(
            c.response_file_url("r1", "f1"),
            "https://forms.example.com/api/responses/r1/files/f1"
        );
    }

    #[test]
    fn test_partial_email_config_falls_back_to_logging() {
        let c = config(&[("EMAIL_PROVIDER_URL", "https://mail.example/send")]);
        assert!(c.email.is_none());
    }

    #[test]
    fn test_invalid_numbers_use_defaults() {
        let c = config(&[("PORT", "http"), ("INVITATION_TTL_DAYS", "0")]);
        assert_eq!(c.port, 3000);
        assert_eq!(c.invitation_ttl_days, 7);
    }
}
