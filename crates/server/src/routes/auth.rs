use std::sync::Arc;

use axum::{Json, extract::State};

use tinta_api::{
    AuthTokenResponse, LogoutRequest, OkResponse, OtpRequest, OtpRequestResponse,
    OtpVerifyRequest, RefreshRequest, ServiceError, UserProfile, crypto,
};

use crate::auth::AuthUser;
use crate::config::AppConfig;
use crate::error::ApiErr;
use crate::mail::{self, Mailer};
use crate::services::users;
use crate::storage::Db;

// ---------------------------------------------------------------------------
// One-time code login
// ---------------------------------------------------------------------------

/// POST /api/auth/otp/request — email a six-digit login code.
pub async fn request_otp(
    State(db): State<Db>,
    State(mailer): State<Arc<dyn Mailer>>,
    Json(req): Json<OtpRequest>,
) -> Result<Json<OtpRequestResponse>, ApiErr> {
    let issued = {
        let conn = db.conn();
        users::request_otp(&conn, &req.email)?
    };

    let ttl_minutes = crypto::OTP_EXPIRY_SECS / 60;
    let email = mail::otp_email(&issued.email, &issued.code, ttl_minutes);
    if let Err(e) = mailer.send(&email).await {
        tracing::error!("sending login code: {e}");
        return Err(
            ServiceError::Unavailable("could not send the login code, try again".into()).into(),
        );
    }

    Ok(Json(OtpRequestResponse {
        success: true,
        expires_in: crypto::OTP_EXPIRY_SECS,
    }))
}

/// POST /api/auth/otp/verify — exchange a code for access + refresh tokens.
pub async fn verify_otp(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    Json(req): Json<OtpVerifyRequest>,
) -> Result<Json<AuthTokenResponse>, ApiErr> {
    let conn = db.conn();
    Ok(Json(users::verify_otp(&conn, &config, &req.email, &req.code)?))
}

// ---------------------------------------------------------------------------
// Token lifecycle
// ---------------------------------------------------------------------------

/// POST /api/auth/refresh — rotate a refresh token.
pub async fn refresh(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<AuthTokenResponse>, ApiErr> {
    let conn = db.conn();
    Ok(Json(users::refresh(&conn, &config, &req.refresh_token)?))
}

/// POST /api/auth/logout — revoke a refresh token.
pub async fn logout(
    State(db): State<Db>,
    Json(req): Json<LogoutRequest>,
) -> Result<Json<OkResponse>, ApiErr> {
    let conn = db.conn();
    users::logout(&conn, &req.refresh_token)?;
    Ok(Json(OkResponse::ok()))
}

/// GET /api/auth/me — profile of the authenticated user.
pub async fn me(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
) -> Result<Json<UserProfile>, ApiErr> {
    let conn = db.conn();
    Ok(Json(users::get_profile(&conn, &config, &user.user_id)?))
}
