use axum::{
    Json,
    extract::{Path, State},
};

use tinta_api::{ListMembersResponse, MemberResponse, OkResponse, UpdateMemberRoleRequest};

use crate::auth::AuthUser;
use crate::config::AppConfig;
use crate::error::ApiErr;
use crate::services::workspaces;
use crate::storage::Db;

/// GET /api/workspaces/:id/members — list members (any member).
pub async fn list_members(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ListMembersResponse>, ApiErr> {
    let conn = db.conn();
    let members = workspaces::list_members(&conn, &config, &id, &user)?;
    Ok(Json(ListMembersResponse { members }))
}

/// PUT /api/workspaces/:id/members/:user_id — change a member's role (admin only).
pub async fn update_member_role(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
    Path((id, user_id)): Path<(String, String)>,
    Json(req): Json<UpdateMemberRoleRequest>,
) -> Result<Json<MemberResponse>, ApiErr> {
    let conn = db.conn();
    Ok(Json(workspaces::update_member_role(
        &conn, &config, &id, &user, &user_id, req.role,
    )?))
}

/// DELETE /api/workspaces/:id/members/:user_id — remove a member, or leave.
pub async fn remove_member(
    State(db): State<Db>,
    user: AuthUser,
    Path((id, user_id)): Path<(String, String)>,
) -> Result<Json<OkResponse>, ApiErr> {
    let conn = db.conn();
    workspaces::remove_member(&conn, &id, &user, &user_id)?;
    Ok(Json(OkResponse::ok()))
}
