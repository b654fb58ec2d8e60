use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use tinta_api::{
    CreateTemplateRequest, ListTemplatesResponse, OkResponse, ReorderFieldsRequest,
    TemplateResponse, UpdateTemplateRequest,
};

use crate::auth::AuthUser;
use crate::error::ApiErr;
use crate::services::templates;
use crate::storage::Db;

/// POST /api/templates — create a reusable field set.
pub async fn create_template(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<TemplateResponse>), ApiErr> {
    let conn = db.conn();
    let template = templates::create(&conn, &user, req)?;
    Ok((StatusCode::CREATED, Json(template)))
}

/// GET /api/templates — every template, newest first.
pub async fn list_templates(
    State(db): State<Db>,
    _user: AuthUser,
) -> Result<Json<ListTemplatesResponse>, ApiErr> {
    let conn = db.conn();
    let templates = templates::list(&conn)?;
    Ok(Json(ListTemplatesResponse { templates }))
}

/// GET /api/templates/:id
pub async fn get_template(
    State(db): State<Db>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TemplateResponse>, ApiErr> {
    let conn = db.conn();
    Ok(Json(templates::get(&conn, &id)?))
}

/// PUT /api/templates/:id — creator or superadmin only.
pub async fn update_template(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateTemplateRequest>,
) -> Result<Json<TemplateResponse>, ApiErr> {
    let conn = db.conn();
    Ok(Json(templates::update(&conn, &id, &user, req)?))
}

/// PUT /api/templates/:id/fields/order
pub async fn reorder_fields(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<ReorderFieldsRequest>,
) -> Result<Json<TemplateResponse>, ApiErr> {
    let conn = db.conn();
    Ok(Json(templates::reorder_fields(
        &conn,
        &id,
        &user,
        &req.field_ids,
    )?))
}

/// DELETE /api/templates/:id — forms built from it are unaffected.
pub async fn delete_template(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    let conn = db.conn();
    templates::delete(&conn, &id, &user)?;
    Ok(Json(OkResponse::ok()))
}
