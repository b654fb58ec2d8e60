//! Cryptographic helpers for authentication and share links.
//!
//! - HMAC-SHA256 JWT signing/verification
//! - Random opaque tokens (refresh tokens, share tokens, invitation tokens)
//! - One-time login codes
//!
//! Uses pure Rust crates only.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::ServiceError;

// ── JWT (HMAC-SHA256) ───────────────────────────────────────────────────────

/// JWT header (always HS256).
const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// JWT expiry: 1 hour in seconds.
pub const JWT_EXPIRY_SECS: u64 = 3600;

/// Refresh token expiry: 30 days in seconds.
pub const REFRESH_EXPIRY_SECS: u64 = 30 * 24 * 3600;

/// One-time login code lifetime: 10 minutes.
pub const OTP_EXPIRY_SECS: u64 = 600;

/// Wrong guesses allowed before a code is burned.
pub const OTP_MAX_ATTEMPTS: i64 = 5;

/// Sign a JWT for the given user. Returns the encoded JWT string.
pub fn sign_jwt(user_id: &str, secret: &str, now_unix: u64) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(JWT_HEADER.as_bytes());

    let payload = serde_json::json!({
        "sub": user_id,
        "iat": now_unix,
        "exp": now_unix + JWT_EXPIRY_SECS,
    });
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());

    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature = hmac_sha256(secret.as_bytes(), signing_input.as_bytes());
    let sig_b64 = URL_SAFE_NO_PAD.encode(signature);

    format!("{signing_input}.{sig_b64}")
}

/// Verify a JWT and return the `sub` (user_id) if valid.
pub fn verify_jwt(token: &str, secret: &str, now_unix: u64) -> Result<String, ServiceError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(ServiceError::Unauthorized("invalid JWT format".into()));
    }

    let signing_input = format!("{}.{}", parts[0], parts[1]);
    let expected_sig = hmac_sha256(secret.as_bytes(), signing_input.as_bytes());
    let actual_sig = URL_SAFE_NO_PAD
        .decode(parts[2])
        .map_err(|_| ServiceError::Unauthorized("invalid JWT signature encoding".into()))?;

    if !constant_time_eq(&expected_sig, &actual_sig) {
        return Err(ServiceError::Unauthorized("invalid JWT signature".into()));
    }

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|_| ServiceError::Unauthorized("invalid JWT payload encoding".into()))?;
    let payload: serde_json::Value = serde_json::from_slice(&payload_bytes)
        .map_err(|_| ServiceError::Unauthorized("invalid JWT payload".into()))?;

    let exp = payload["exp"]
        .as_u64()
        .ok_or_else(|| ServiceError::Unauthorized("missing exp claim".into()))?;
    if now_unix > exp {
        return Err(ServiceError::Unauthorized("JWT expired".into()));
    }

    let sub = payload["sub"]
        .as_str()
        .ok_or_else(|| ServiceError::Unauthorized("missing sub claim".into()))?
        .to_string();

    Ok(sub)
}

// ── Opaque tokens ───────────────────────────────────────────────────────────

/// Generate a secure random token. Returns 64 hex characters.
pub fn generate_token() -> Result<String, ServiceError> {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| ServiceError::Internal(format!("RNG failure: {e}")))?;
    Ok(hex::encode(bytes))
}

/// Shorter URL-friendly token for public form links (22 chars, 128 bits).
pub fn generate_share_token() -> Result<String, ServiceError> {
    let mut bytes = [0u8; 16];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| ServiceError::Internal(format!("RNG failure: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a token with SHA-256 for storage. Returns hex-encoded.
pub fn hash_token(token: &str) -> String {
    use sha2::Digest;
    let hash = sha2::Sha256::digest(token.as_bytes());
    hex::encode(hash)
}

// ── One-time codes ──────────────────────────────────────────────────────────

/// Six-digit numeric login code, zero padded.
pub fn generate_otp() -> Result<String, ServiceError> {
    let mut bytes = [0u8; 4];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| ServiceError::Internal(format!("RNG failure: {e}")))?;
    let n = u32::from_le_bytes(bytes) % 1_000_000;
    Ok(format!("{n:06}"))
}

/// Codes are bound to the email they were sent to.
pub fn hash_otp(email: &str, code: &str) -> String {
    hash_token(&format!("{email}:{code}"))
}

pub fn verify_otp(email: &str, code: &str, stored_hash: &str) -> bool {
    constant_time_eq(hash_otp(email, code.trim()).as_bytes(), stored_hash.as_bytes())
}

// ── Internal ────────────────────────────────────────────────────────────────

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_jwt_round_trip() {
        let token = sign_jwt("user-1", SECRET, 1_000);
        assert_eq!(verify_jwt(&token, SECRET, 1_000).unwrap(), "user-1");
        assert_eq!(
            verify_jwt(&token, SECRET, 1_000 + JWT_EXPIRY_SECS).unwrap(),
            "user-1"
        );
    }

    #[test]
    fn test_jwt_rejections() {
        let token = sign_jwt("user-1", SECRET, 1_000);
        assert!(verify_jwt(&token, "other-secret", 1_000).is_err());
        assert!(verify_jwt(&token, SECRET, 1_001 + JWT_EXPIRY_SECS).is_err());
        assert!(verify_jwt("a.b", SECRET, 1_000).is_err());

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(br#"{"sub":"admin","exp":99999999999}"#);
        parts[1] = &forged;
        assert!(verify_jwt(&parts.join("."), SECRET, 1_000).is_err());
    }

    #[test]
    fn test_tokens_are_random_and_sized() {
        let a = generate_token().unwrap();
        let b = generate_token().unwrap();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);

        let s = generate_share_token().unwrap();
        assert_eq!(s.len(), 22);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_otp() {
        let code = generate_otp().unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));

        let stored = hash_otp("a@b.co", &code);
        assert!(verify_otp("a@b.co", &code, &stored));
        assert!(verify_otp("a@b.co", &format!(" {code} "), &stored));
        assert!(!verify_otp("c@d.co", &code, &stored));
    }
}
