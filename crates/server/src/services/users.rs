//! Users, one-time-code login, and token lifecycle.

use rusqlite::{Connection, Row};

use tinta_api::{
    AuthTokenResponse, GlobalRole, ImageUploadResponse, ServiceError, UserProfile, crypto, db,
    service,
};
use tinta_core::blob::{self, BlobStore};
use tinta_core::upload::{self, UploadKind};

use super::now_unix;
use crate::config::AppConfig;
use crate::storage::{exec, query_opt};

/// A freshly issued login code; the caller emails it.
#[derive(Debug)]
pub struct IssuedCode {
    pub email: String,
    pub code: String,
}

pub fn request_otp(conn: &Connection, email: &str) -> Result<IssuedCode, ServiceError> {
    let email = service::validate_email(email)?;
    let code = crypto::generate_otp()?;
    let expires_at = service::sqlite_after(now_unix(), crypto::OTP_EXPIRY_SECS)?;
    exec(
        conn,
        db::users::upsert_otp(&email, &crypto::hash_otp(&email, &code), &expires_at),
        "store otp",
    )?;
    Ok(IssuedCode { email, code })
}

/// Exchange a code for tokens, creating the account on first login.
pub fn verify_otp(
    conn: &Connection,
    config: &AppConfig,
    email: &str,
    code: &str,
) -> Result<AuthTokenResponse, ServiceError> {
    let email = service::validate_email(email)?;
    let now = now_unix();
    let now_sql = service::sqlite_now(now)?;

    let stored = query_opt(conn, db::users::get_otp(&email), "load otp", |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;
    let Some((code_hash, attempts, expires_at)) = stored else {
        return Err(ServiceError::Unauthorized("invalid or expired code".into()));
    };

    if expires_at <= now_sql {
        exec(conn, db::users::delete_otp(&email), "delete otp")?;
        return Err(ServiceError::Unauthorized("code expired, request a new one".into()));
    }
    if attempts >= crypto::OTP_MAX_ATTEMPTS {
        exec(conn, db::users::delete_otp(&email), "delete otp")?;
        return Err(ServiceError::Unauthorized(
            "too many attempts, request a new code".into(),
        ));
    }
    if !crypto::verify_otp(&email, code, &code_hash) {
        if attempts + 1 >= crypto::OTP_MAX_ATTEMPTS {
            exec(conn, db::users::delete_otp(&email), "delete otp")?;
        } else {
            exec(conn, db::users::increment_otp_attempts(&email), "count otp attempt")?;
        }
        return Err(ServiceError::Unauthorized("invalid or expired code".into()));
    }
    exec(conn, db::users::delete_otp(&email), "consume otp")?;

    let listed = config.is_superadmin_email(&email);
    let existing = query_opt(conn, db::users::get_by_email(&email), "load user", |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(4)?))
    })?;
    let (user_id, is_new_user) = match existing {
        Some((id, role)) => {
            if listed && role.as_deref() != Some(GlobalRole::Superadmin.as_str()) {
                exec(
                    conn,
                    db::users::set_role(&id, Some(GlobalRole::Superadmin.as_str())),
                    "promote superadmin",
                )?;
                tracing::info!(user_id = %id, "promoted to superadmin");
            }
            (id, false)
        }
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            let role = listed.then_some(GlobalRole::Superadmin.as_str());
            exec(conn, db::users::insert(&id, &email, role), "create user")?;
            tracing::info!(user_id = %id, "user created");
            (id, true)
        }
    };

    issue_tokens(conn, config, &user_id, &email, is_new_user, now)
}

fn issue_tokens(
    conn: &Connection,
    config: &AppConfig,
    user_id: &str,
    email: &str,
    is_new_user: bool,
    now: u64,
) -> Result<AuthTokenResponse, ServiceError> {
    let bundle =
        service::prepare_token_bundle(&config.jwt_secret, user_id, email, is_new_user, now)?;
    exec(
        conn,
        db::users::insert_refresh_token(
            &bundle.token_id,
            user_id,
            &bundle.token_hash,
            &bundle.expires_at,
        ),
        "store refresh token",
    )?;
    Ok(bundle.response)
}

/// Rotate a refresh token: the presented one is consumed.
pub fn refresh(
    conn: &Connection,
    config: &AppConfig,
    refresh_token: &str,
) -> Result<AuthTokenResponse, ServiceError> {
    let now = now_unix();
    let token_hash = crypto::hash_token(refresh_token);
    let owner = query_opt(
        conn,
        db::users::refresh_token_owner(&token_hash, &service::sqlite_now(now)?),
        "load refresh token",
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
    )?;
    let Some((user_id, email)) = owner else {
        return Err(ServiceError::Unauthorized(
            "invalid or expired refresh token".into(),
        ));
    };
    exec(conn, db::users::delete_refresh_token(&token_hash), "revoke refresh token")?;
    issue_tokens(conn, config, &user_id, &email, false, now)
}

/// Idempotent: unknown tokens are ignored.
pub fn logout(conn: &Connection, refresh_token: &str) -> Result<(), ServiceError> {
    exec(
        conn,
        db::users::delete_refresh_token(&crypto::hash_token(refresh_token)),
        "revoke refresh token",
    )?;
    Ok(())
}

// ─── Profile ────────────────────────────────────────────────────────────────

fn profile_from_row(row: &Row<'_>, config: &AppConfig) -> rusqlite::Result<UserProfile> {
    let image_key: Option<String> = row.get(3)?;
    let role: Option<String> = row.get(4)?;
    Ok(UserProfile {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        image_url: image_key.map(|k| config.blob_url(&k)),
        role: role.as_deref().and_then(GlobalRole::parse),
        onboarded: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn get_profile(
    conn: &Connection,
    config: &AppConfig,
    user_id: &str,
) -> Result<UserProfile, ServiceError> {
    query_opt(conn, db::users::get_by_id(user_id), "load profile", |row| {
        profile_from_row(row, config)
    })?
    .ok_or_else(|| ServiceError::NotFound("user not found".into()))
}

pub fn update_profile(
    conn: &Connection,
    config: &AppConfig,
    user_id: &str,
    name: &str,
) -> Result<UserProfile, ServiceError> {
    let name = service::validate_name(name)?;
    exec(conn, db::users::update_name(user_id, &name), "update profile")?;
    get_profile(conn, config, user_id)
}

/// First-login step: set a display name. Calling it again just renames.
pub fn complete_onboarding(
    conn: &Connection,
    config: &AppConfig,
    user_id: &str,
    name: &str,
) -> Result<UserProfile, ServiceError> {
    let name = service::validate_name(name)?;
    exec(
        conn,
        db::users::complete_onboarding(user_id, &name),
        "complete onboarding",
    )?;
    get_profile(conn, config, user_id)
}

pub fn set_avatar(
    conn: &Connection,
    config: &AppConfig,
    blobs: &dyn BlobStore,
    user_id: &str,
    content_type: &str,
    bytes: &[u8],
) -> Result<ImageUploadResponse, ServiceError> {
    let content_type = upload::check(UploadKind::Avatar, content_type, bytes.len())?;
    let previous = query_opt(conn, db::users::get_by_id(user_id), "load profile", |row| {
        row.get::<_, Option<String>>(3)
    })?
    .ok_or_else(|| ServiceError::NotFound("user not found".into()))?;

    let key = blob::avatar_key(user_id, upload::extension_for(&content_type));
    blobs.put(&key, bytes)?;
    if let Err(e) = exec(conn, db::users::set_image_key(user_id, &key), "set avatar") {
        let _ = blobs.delete(&key);
        return Err(e);
    }
    if let Some(old) = previous {
        if let Err(e) = blobs.delete(&old) {
            tracing::warn!("failed to remove old avatar {old}: {e}");
        }
    }
    Ok(ImageUploadResponse {
        url: config.blob_url(&key),
        key,
    })
}
