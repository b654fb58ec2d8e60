use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use tinta_api::{
    AcceptInvitationResponse, CreateInvitationRequest, InvitationLookupResponse,
    InvitationResponse, ListInvitationsResponse, OkResponse, ServiceError,
};

use crate::auth::AuthUser;
use crate::config::AppConfig;
use crate::error::ApiErr;
use crate::mail::{self, Mailer};
use crate::services::invitations::{self, IssuedInvitation};
use crate::storage::Db;

async fn send_invitation(
    mailer: &dyn Mailer,
    config: &AppConfig,
    issued: &IssuedInvitation,
    inviter: &AuthUser,
) -> Result<(), ServiceError> {
    let email = mail::invitation_email(
        &issued.invitation.email,
        &issued.workspace_name,
        &inviter.email,
        &config.invitation_url(&issued.token),
    );
    mailer.send(&email).await.map_err(|e| {
        tracing::error!(invitation_id = %issued.invitation.id, "sending invitation: {e}");
        ServiceError::Unavailable("could not send the invitation email, try again".into())
    })
}

// ---------------------------------------------------------------------------
// Workspace admins
// ---------------------------------------------------------------------------

/// POST /api/workspaces/:id/invitations — invite by email (admin only).
/// The invitation is dropped again when the email cannot be sent.
pub async fn create_invitation(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    State(mailer): State<Arc<dyn Mailer>>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<InvitationResponse>), ApiErr> {
    let issued = {
        let conn = db.conn();
        invitations::create(&conn, &config, &id, &user, &req)?
    };

    if let Err(e) = send_invitation(mailer.as_ref(), &config, &issued, &user).await {
        let conn = db.conn();
        if let Err(discard) = invitations::discard(&conn, &issued.invitation.id) {
            tracing::error!("discarding undelivered invitation: {discard}");
        }
        return Err(e.into());
    }

    Ok((StatusCode::CREATED, Json(issued.invitation)))
}

/// GET /api/workspaces/:id/invitations — every invitation of the workspace.
pub async fn list_workspace_invitations(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ListInvitationsResponse>, ApiErr> {
    let conn = db.conn();
    let invitations = invitations::list_for_workspace(&conn, &id, &user)?;
    Ok(Json(ListInvitationsResponse { invitations }))
}

/// DELETE /api/workspaces/:id/invitations/:invitation_id — cancel a pending invitation.
pub async fn cancel_invitation(
    State(db): State<Db>,
    user: AuthUser,
    Path((id, invitation_id)): Path<(String, String)>,
) -> Result<Json<OkResponse>, ApiErr> {
    let conn = db.conn();
    invitations::cancel(&conn, &id, &invitation_id, &user)?;
    Ok(Json(OkResponse::ok()))
}

/// POST /api/workspaces/:id/invitations/:invitation_id/resend — new token,
/// new expiry, new email.
pub async fn resend_invitation(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    State(mailer): State<Arc<dyn Mailer>>,
    user: AuthUser,
    Path((id, invitation_id)): Path<(String, String)>,
) -> Result<Json<InvitationResponse>, ApiErr> {
    let issued = {
        let conn = db.conn();
        invitations::resend(&conn, &config, &id, &invitation_id, &user)?
    };
    send_invitation(mailer.as_ref(), &config, &issued, &user).await?;
    Ok(Json(issued.invitation))
}

// ---------------------------------------------------------------------------
// Invitee
// ---------------------------------------------------------------------------

/// GET /api/invitations — pending invitations addressed to the caller.
pub async fn list_my_invitations(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<ListInvitationsResponse>, ApiErr> {
    let conn = db.conn();
    let invitations = invitations::list_for_user(&conn, &user)?;
    Ok(Json(ListInvitationsResponse { invitations }))
}

/// GET /api/invitations/:token — public preview of an invitation link.
pub async fn lookup_invitation(
    State(db): State<Db>,
    Path(token): Path<String>,
) -> Result<Json<InvitationLookupResponse>, ApiErr> {
    let conn = db.conn();
    Ok(Json(invitations::lookup(&conn, &token)?))
}

/// POST /api/invitations/:token/accept — join the workspace.
pub async fn accept_invitation(
    State(db): State<Db>,
    user: AuthUser,
    Path(token): Path<String>,
) -> Result<Json<AcceptInvitationResponse>, ApiErr> {
    let conn = db.conn();
    Ok(Json(invitations::accept(&conn, &token, &user)?))
}
