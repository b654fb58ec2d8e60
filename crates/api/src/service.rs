//! Shared business logic — framework-agnostic pure functions.
//!
//! Route handlers and domain services call these so that normalisation rules
//! live in one place.

use crate::{AuthTokenResponse, ServiceError};

// ─── Validation ─────────────────────────────────────────────────────────────

/// Validate and normalize an email address. Returns the lowercased, trimmed email.
pub fn validate_email(email: &str) -> Result<String, ServiceError> {
    let email = email.trim().to_lowercase();
    let valid_shape = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid_shape || email.len() > 254 || email.contains(char::is_whitespace) {
        return Err(ServiceError::BadRequest("invalid email address".into()));
    }
    Ok(email)
}

/// Validate and normalize a person's display name.
pub fn validate_name(name: &str) -> Result<String, ServiceError> {
    bounded_text(name, 1, 80, "name")
}

pub fn validate_workspace_name(name: &str) -> Result<String, ServiceError> {
    bounded_text(name, 2, 80, "workspace name")
}

pub fn validate_template_name(name: &str) -> Result<String, ServiceError> {
    bounded_text(name, 1, 120, "template name")
}

pub fn validate_form_title(title: &str) -> Result<String, ServiceError> {
    bounded_text(title, 1, 200, "form title")
}

/// Trim a description; blank becomes `None`.
pub fn normalize_description(description: Option<&str>) -> Result<Option<String>, ServiceError> {
    let Some(d) = description.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    if d.chars().count() > 2000 {
        return Err(ServiceError::BadRequest(
            "description must be at most 2000 characters".into(),
        ));
    }
    Ok(Some(d.to_string()))
}

fn bounded_text(raw: &str, min: usize, max: usize, what: &str) -> Result<String, ServiceError> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if len < min || len > max {
        return Err(ServiceError::BadRequest(format!(
            "{what} must be {min}-{max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

// ─── Timestamps ─────────────────────────────────────────────────────────────

/// SQLite `datetime()` text format used in every timestamp column.
pub const SQLITE_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

/// `now + secs` in SQLite datetime format.
pub fn sqlite_after(now_unix: u64, secs: u64) -> Result<String, ServiceError> {
    let base = chrono::DateTime::from_timestamp(now_unix as i64, 0)
        .ok_or_else(|| ServiceError::Internal("invalid timestamp".into()))?;
    Ok(base
        .checked_add_signed(chrono::Duration::seconds(secs as i64))
        .ok_or_else(|| ServiceError::Internal("timestamp overflow".into()))?
        .format(SQLITE_DATETIME)
        .to_string())
}

pub fn sqlite_now(now_unix: u64) -> Result<String, ServiceError> {
    sqlite_after(now_unix, 0)
}

// ─── Token Bundle ───────────────────────────────────────────────────────────

/// Pre-computed token bundle returned by [`prepare_token_bundle`].
///
/// The caller only needs to insert the refresh token row.
pub struct TokenBundle {
    pub refresh_token: String,
    /// SHA-256 hash of the refresh token (stored in DB).
    pub token_hash: String,
    pub token_id: String,
    pub expires_at: String,
    pub response: AuthTokenResponse,
}

pub fn prepare_token_bundle(
    jwt_secret: &str,
    user_id: &str,
    email: &str,
    is_new_user: bool,
    now_unix: u64,
) -> Result<TokenBundle, ServiceError> {
    use crate::crypto;

    if jwt_secret.is_empty() {
        return Err(ServiceError::Unavailable(
            "JWT authentication not configured".into(),
        ));
    }

    let access_token = crypto::sign_jwt(user_id, jwt_secret, now_unix);
    let refresh_token = crypto::generate_token()?;
    let token_hash = crypto::hash_token(&refresh_token);
    let token_id = uuid::Uuid::new_v4().to_string();
    let expires_at = sqlite_after(now_unix, crypto::REFRESH_EXPIRY_SECS)?;

    let response = AuthTokenResponse {
        access_token,
        refresh_token: refresh_token.clone(),
        expires_in: crypto::JWT_EXPIRY_SECS,
        user_id: user_id.to_string(),
        email: email.to_string(),
        is_new_user,
    };

    Ok(TokenBundle {
        refresh_token,
        token_hash,
        token_id,
        expires_at,
        response,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("a@localhost").is_err());
        assert!(validate_email("a b@example.com").is_err());
    }

    #[test]
    fn test_bounded_names() {
        assert_eq!(validate_name("  bob  ").unwrap(), "bob");
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(81)).is_err());
        assert!(validate_workspace_name("A").is_err());
        assert!(validate_form_title(&"é".repeat(200)).is_ok());
    }

    #[test]
    fn test_normalize_description() {
        assert_eq!(normalize_description(None).unwrap(), None);
        assert_eq!(normalize_description(Some("  ")).unwrap(), None);
        assert_eq!(
            normalize_description(Some(" hi ")).unwrap(),
            Some("hi".to_string())
        );
        assert!(normalize_description(Some(&"x".repeat(2001))).is_err());
    }

    #[test]
    fn test_sqlite_after() {
        assert_eq!(sqlite_after(0, 3600).unwrap(), "1970-01-01 01:00:00");
    }

    #[test]
    fn test_token_bundle() {
        let bundle = prepare_token_bundle("secret", "u1", "a@b.co", true, 1_000).unwrap();
        assert_eq!(bundle.response.user_id, "u1");
        assert!(bundle.response.is_new_user);
        assert_eq!(bundle.token_hash, crate::crypto::hash_token(&bundle.refresh_token));
        assert!(prepare_token_bundle("", "u1", "a@b.co", false, 1_000).is_err());
    }
}
