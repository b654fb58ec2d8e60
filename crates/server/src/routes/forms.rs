use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use tinta_api::{
    CreateFormRequest, FormInfo, ListFormsResponse, MoveFieldRequest, OkResponse,
    ReorderFieldsRequest, ShareTokenResponse, UpdateFormRequest,
};

use crate::auth::AuthUser;
use crate::config::AppConfig;
use crate::error::ApiErr;
use crate::services::forms;
use crate::storage::Db;

// ---------------------------------------------------------------------------
// Create / list
// ---------------------------------------------------------------------------

/// POST /api/workspaces/:id/forms — create a form, optionally from a template.
pub async fn create_form(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
    Path(workspace_id): Path<String>,
    Json(req): Json<CreateFormRequest>,
) -> Result<(StatusCode, Json<FormInfo>), ApiErr> {
    let conn = db.conn();
    let form = forms::create(&conn, &config, &workspace_id, &user, req)?;
    Ok((StatusCode::CREATED, Json(form)))
}

/// GET /api/workspaces/:id/forms — forms with response counters.
pub async fn list_forms(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
    Path(workspace_id): Path<String>,
) -> Result<Json<ListFormsResponse>, ApiErr> {
    let conn = db.conn();
    let forms = forms::list_for_workspace(&conn, &config, &workspace_id, &user)?;
    Ok(Json(ListFormsResponse { forms }))
}

// ---------------------------------------------------------------------------
// Single form
// ---------------------------------------------------------------------------

/// GET /api/forms/:id
pub async fn get_form(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<FormInfo>, ApiErr> {
    let conn = db.conn();
    Ok(Json(forms::get(&conn, &config, &id, &user)?))
}

/// PUT /api/forms/:id — partial update; `fields` replaces the whole list.
pub async fn update_form(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateFormRequest>,
) -> Result<Json<FormInfo>, ApiErr> {
    let conn = db.conn();
    Ok(Json(forms::update(&conn, &config, &id, &user, req)?))
}

/// PUT /api/forms/:id/fields/order — full ordering by field id.
pub async fn reorder_fields(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<ReorderFieldsRequest>,
) -> Result<Json<FormInfo>, ApiErr> {
    let conn = db.conn();
    Ok(Json(forms::reorder_fields(
        &conn,
        &config,
        &id,
        &user,
        &req.field_ids,
    )?))
}

/// POST /api/forms/:id/fields/move — move one field by index.
pub async fn move_field(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<MoveFieldRequest>,
) -> Result<Json<FormInfo>, ApiErr> {
    let conn = db.conn();
    Ok(Json(forms::move_field(
        &conn, &config, &id, &user, req.from, req.to,
    )?))
}

/// POST /api/forms/:id/share-token — invalidate the old public link.
pub async fn regenerate_share_token(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ShareTokenResponse>, ApiErr> {
    let conn = db.conn();
    Ok(Json(forms::regenerate_share_token(&conn, &config, &id, &user)?))
}

/// DELETE /api/forms/:id — admins only, and only while it has no responses.
pub async fn delete_form(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    let conn = db.conn();
    forms::delete(&conn, &id, &user)?;
    Ok(Json(OkResponse::ok()))
}
