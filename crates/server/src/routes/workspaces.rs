use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};

use tinta_api::{
    CreateWorkspaceRequest, ImageUploadResponse, ListWorkspacesResponse, OkResponse,
    SlugAvailabilityQuery, SlugAvailabilityResponse, UpdateWorkspaceRequest,
    WorkspaceDetailResponse,
};

use super::read_single_file;
use crate::auth::AuthUser;
use crate::config::AppConfig;
use crate::error::ApiErr;
use crate::services::{responses::discard_blobs, workspaces};
use crate::storage::Db;

// ---------------------------------------------------------------------------
// Create / list
// ---------------------------------------------------------------------------

/// POST /api/workspaces — create a workspace. Creator becomes its admin.
pub async fn create_workspace(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
    Json(req): Json<CreateWorkspaceRequest>,
) -> Result<(StatusCode, Json<WorkspaceDetailResponse>), ApiErr> {
    let conn = db.conn();
    let workspace = workspaces::create(&conn, &config, &user, &req)?;
    Ok((StatusCode::CREATED, Json(workspace)))
}

/// GET /api/workspaces — workspaces the caller belongs to (all for superadmins).
pub async fn list_workspaces(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
) -> Result<Json<ListWorkspacesResponse>, ApiErr> {
    let conn = db.conn();
    let workspaces = workspaces::list_for_user(&conn, &config, &user)?;
    Ok(Json(ListWorkspacesResponse { workspaces }))
}

/// GET /api/workspaces/slug-available?slug= — check a slug before creating.
pub async fn slug_available(
    State(db): State<Db>,
    _user: AuthUser,
    Query(q): Query<SlugAvailabilityQuery>,
) -> Result<Json<SlugAvailabilityResponse>, ApiErr> {
    let conn = db.conn();
    Ok(Json(workspaces::slug_available(&conn, &q.slug)?))
}

// ---------------------------------------------------------------------------
// Detail
// ---------------------------------------------------------------------------

/// GET /api/workspaces/:id — workspace detail for members.
pub async fn get_workspace(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<WorkspaceDetailResponse>, ApiErr> {
    let conn = db.conn();
    Ok(Json(workspaces::get(&conn, &config, &id, &user)?))
}

/// GET /api/workspaces/by-slug/:slug — same as above, addressed by slug.
pub async fn get_workspace_by_slug(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
    Path(slug): Path<String>,
) -> Result<Json<WorkspaceDetailResponse>, ApiErr> {
    let conn = db.conn();
    Ok(Json(workspaces::get_by_slug(&conn, &config, &slug, &user)?))
}

// ---------------------------------------------------------------------------
// Update / delete
// ---------------------------------------------------------------------------

/// PUT /api/workspaces/:id — rename or change description (admin only).
pub async fn update_workspace(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateWorkspaceRequest>,
) -> Result<Json<WorkspaceDetailResponse>, ApiErr> {
    let conn = db.conn();
    Ok(Json(workspaces::update(&conn, &config, &id, &user, &req)?))
}

/// POST /api/workspaces/:id/image — multipart image upload (admin only).
pub async fn upload_image(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<ImageUploadResponse>, ApiErr> {
    let file = read_single_file(multipart).await?;
    let conn = db.conn();
    Ok(Json(workspaces::set_image(
        &conn,
        &config,
        db.blobs(),
        &id,
        &user,
        &file.content_type,
        &file.bytes,
    )?))
}

/// DELETE /api/workspaces/:id — delete the workspace with its forms,
/// responses and stored files (admin only).
pub async fn delete_workspace(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    let conn = db.conn();
    let keys = workspaces::delete(&conn, &id, &user)?;
    discard_blobs(db.blobs(), keys.iter().map(String::as_str));
    Ok(Json(OkResponse::ok()))
}
