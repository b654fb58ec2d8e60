use axum::{
    Json,
    extract::{Multipart, State},
};

use tinta_api::{ImageUploadResponse, OnboardingRequest, UpdateProfileRequest, UserProfile};

use super::read_single_file;
use crate::auth::AuthUser;
use crate::config::AppConfig;
use crate::error::ApiErr;
use crate::services::users;
use crate::storage::Db;

/// PUT /api/users/me — change display name.
pub async fn update_profile(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, ApiErr> {
    let conn = db.conn();
    Ok(Json(users::update_profile(
        &conn,
        &config,
        &user.user_id,
        &req.name,
    )?))
}

/// POST /api/users/me/onboarding — set the name and mark the account onboarded.
pub async fn complete_onboarding(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
    Json(req): Json<OnboardingRequest>,
) -> Result<Json<UserProfile>, ApiErr> {
    let conn = db.conn();
    Ok(Json(users::complete_onboarding(
        &conn,
        &config,
        &user.user_id,
        &req.name,
    )?))
}

/// POST /api/users/me/avatar — multipart image upload, replaces the old one.
pub async fn upload_avatar(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<Json<ImageUploadResponse>, ApiErr> {
    let file = read_single_file(multipart).await?;
    let conn = db.conn();
    Ok(Json(users::set_avatar(
        &conn,
        &config,
        db.blobs(),
        &user.user_id,
        &file.content_type,
        &file.bytes,
    )?))
}
