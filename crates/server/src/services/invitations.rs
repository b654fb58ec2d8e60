//! Invitation lifecycle: created → accepted | expired | canceled.

use rusqlite::{Connection, Row};

use tinta_api::{
    AcceptInvitationResponse, CreateInvitationRequest, InvitationLookupResponse,
    InvitationResponse, InvitationStatus, ServiceError, WorkspaceRole, crypto, db, service,
};

use super::{now_sql, now_unix, require_admin, workspaces};
use crate::auth::AuthUser;
use crate::config::AppConfig;
use crate::storage::{exec, query_all, query_one, query_opt};

struct InvitationRow {
    id: String,
    workspace_id: String,
    workspace_name: String,
    workspace_slug: String,
    email: String,
    role: WorkspaceRole,
    stored_status: InvitationStatus,
    invited_by: Option<String>,
    expires_at: String,
    created_at: String,
}

fn invitation_from_row(row: &Row<'_>) -> rusqlite::Result<InvitationRow> {
    let role: String = row.get(5)?;
    let status: String = row.get(6)?;
    Ok(InvitationRow {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        workspace_name: row.get(2)?,
        workspace_slug: row.get(3)?,
        email: row.get(4)?,
        role: WorkspaceRole::parse(&role).unwrap_or_default(),
        stored_status: InvitationStatus::parse(&status).unwrap_or(InvitationStatus::Canceled),
        invited_by: row.get(7)?,
        expires_at: row.get(8)?,
        created_at: row.get(9)?,
    })
}

impl InvitationRow {
    /// `Expired` is never stored; a pending row past its expiry reads as one.
    fn status(&self, now: &str) -> InvitationStatus {
        match self.stored_status {
            InvitationStatus::Pending if self.expires_at.as_str() <= now => {
                InvitationStatus::Expired
            }
            other => other,
        }
    }

    fn into_response(self, now: &str) -> InvitationResponse {
        InvitationResponse {
            status: self.status(now),
            id: self.id,
            workspace_id: self.workspace_id,
            workspace_name: self.workspace_name,
            email: self.email,
            role: self.role,
            invited_by: self.invited_by,
            expires_at: self.expires_at,
            created_at: self.created_at,
        }
    }
}

fn load_in_workspace(
    conn: &Connection,
    workspace_id: &str,
    id: &str,
) -> Result<InvitationRow, ServiceError> {
    query_opt(
        conn,
        db::invitations::get_in_workspace(workspace_id, id),
        "load invitation",
        invitation_from_row,
    )?
    .ok_or_else(|| ServiceError::NotFound("invitation not found".into()))
}

fn load_by_token(conn: &Connection, token: &str) -> Result<InvitationRow, ServiceError> {
    query_opt(
        conn,
        db::invitations::get_by_token(token),
        "load invitation",
        invitation_from_row,
    )?
    .ok_or_else(|| ServiceError::NotFound("invitation not found".into()))
}

/// A stored invitation plus what the caller needs to email it.
#[derive(Debug)]
pub struct IssuedInvitation {
    pub invitation: InvitationResponse,
    pub token: String,
    pub workspace_name: String,
}

pub fn create(
    conn: &Connection,
    config: &AppConfig,
    workspace_id: &str,
    inviter: &AuthUser,
    req: &CreateInvitationRequest,
) -> Result<IssuedInvitation, ServiceError> {
    require_admin(conn, workspace_id, inviter)?;
    let email = service::validate_email(&req.email)?;
    let role = req.role.unwrap_or_default();
    let now = now_sql()?;

    let is_member = query_one(
        conn,
        db::workspaces::email_is_member(workspace_id, &email),
        "check membership",
        |r| r.get::<_, bool>(0),
    )?;
    if is_member {
        return Err(ServiceError::Conflict(format!(
            "{email} is already a member of this workspace"
        )));
    }
    let pending = query_one(
        conn,
        db::invitations::pending_exists(workspace_id, &email, &now),
        "check pending invitations",
        |r| r.get::<_, bool>(0),
    )?;
    if pending {
        return Err(ServiceError::Conflict(format!(
            "{email} already has a pending invitation"
        )));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let token = crypto::generate_token()?;
    let expires_at = service::sqlite_after(now_unix(), config.invitation_ttl_secs())?;
    exec(
        conn,
        db::invitations::insert(&db::invitations::InsertParams {
            id: &id,
            workspace_id,
            email: &email,
            role: role.as_str(),
            token: &token,
            invited_by: &inviter.user_id,
            expires_at: &expires_at,
        }),
        "create invitation",
    )?;
    tracing::info!(invitation_id = %id, %workspace_id, role = %role, "invitation created");

    let row = load_in_workspace(conn, workspace_id, &id)?;
    let workspace_name = row.workspace_name.clone();
    Ok(IssuedInvitation {
        invitation: row.into_response(&now),
        token,
        workspace_name,
    })
}

/// Remove an invitation whose email could not be delivered.
pub fn discard(conn: &Connection, invitation_id: &str) -> Result<(), ServiceError> {
    exec(conn, db::invitations::delete(invitation_id), "discard invitation")?;
    Ok(())
}

pub fn list_for_workspace(
    conn: &Connection,
    workspace_id: &str,
    user: &AuthUser,
) -> Result<Vec<InvitationResponse>, ServiceError> {
    require_admin(conn, workspace_id, user)?;
    let now = now_sql()?;
    let rows = query_all(
        conn,
        db::invitations::list_for_workspace(workspace_id),
        "list invitations",
        invitation_from_row,
    )?;
    Ok(rows.into_iter().map(|r| r.into_response(&now)).collect())
}

/// Live invitations addressed to the caller.
pub fn list_for_user(
    conn: &Connection,
    user: &AuthUser,
) -> Result<Vec<InvitationResponse>, ServiceError> {
    let now = now_sql()?;
    let rows = query_all(
        conn,
        db::invitations::list_pending_for_email(&user.email.to_lowercase(), &now),
        "list invitations",
        invitation_from_row,
    )?;
    Ok(rows.into_iter().map(|r| r.into_response(&now)).collect())
}

pub fn cancel(
    conn: &Connection,
    workspace_id: &str,
    invitation_id: &str,
    user: &AuthUser,
) -> Result<(), ServiceError> {
    require_admin(conn, workspace_id, user)?;
    load_in_workspace(conn, workspace_id, invitation_id)?;
    let changed = exec(conn, db::invitations::cancel(invitation_id), "cancel invitation")?;
    if changed == 0 {
        return Err(ServiceError::Conflict("invitation is no longer pending".into()));
    }
    Ok(())
}

/// Rotate token and expiry of a pending invitation. Expired ones are revived.
pub fn resend(
    conn: &Connection,
    config: &AppConfig,
    workspace_id: &str,
    invitation_id: &str,
    user: &AuthUser,
) -> Result<IssuedInvitation, ServiceError> {
    require_admin(conn, workspace_id, user)?;
    load_in_workspace(conn, workspace_id, invitation_id)?;

    let token = crypto::generate_token()?;
    let expires_at = service::sqlite_after(now_unix(), config.invitation_ttl_secs())?;
    let changed = exec(
        conn,
        db::invitations::rotate_token(invitation_id, &token, &expires_at),
        "rotate invitation token",
    )?;
    if changed == 0 {
        return Err(ServiceError::Conflict("invitation is no longer pending".into()));
    }

    let row = load_in_workspace(conn, workspace_id, invitation_id)?;
    let workspace_name = row.workspace_name.clone();
    Ok(IssuedInvitation {
        invitation: row.into_response(&now_sql()?),
        token,
        workspace_name,
    })
}

/// What the invitee sees before accepting. Terminal states are reported, not
/// raised.
pub fn lookup(conn: &Connection, token: &str) -> Result<InvitationLookupResponse, ServiceError> {
    let row = load_by_token(conn, token)?;
    let status = row.status(&now_sql()?);
    Ok(InvitationLookupResponse {
        workspace_id: row.workspace_id,
        workspace_name: row.workspace_name,
        workspace_slug: row.workspace_slug,
        email: row.email,
        role: row.role,
        status,
        expires_at: row.expires_at,
    })
}

fn ensure_acceptable(row: &InvitationRow, now: &str) -> Result<(), ServiceError> {
    match row.status(now) {
        InvitationStatus::Pending => Ok(()),
        InvitationStatus::Accepted => Err(ServiceError::Gone(
            "this invitation has already been accepted".into(),
        )),
        InvitationStatus::Canceled => {
            Err(ServiceError::Gone("this invitation was canceled".into()))
        }
        InvitationStatus::Expired => Err(ServiceError::Gone("this invitation has expired".into())),
    }
}

/// Consume the invitation and add the membership atomically.
///
/// When the caller is already a member the invitation is still consumed and
/// the call fails with `Conflict`.
pub fn accept(
    conn: &Connection,
    token: &str,
    user: &AuthUser,
) -> Result<AcceptInvitationResponse, ServiceError> {
    let now = now_sql()?;
    let tx = conn
        .unchecked_transaction()
        .map_err(ServiceError::from_db("begin accept invitation"))?;

    let row = load_by_token(&tx, token)?;
    ensure_acceptable(&row, &now)?;
    if !row.email.eq_ignore_ascii_case(&user.email) {
        return Err(ServiceError::Forbidden(
            "this invitation was sent to a different email address".into(),
        ));
    }

    let consumed = exec(
        &tx,
        db::invitations::mark_accepted(&row.id, &user.user_id, &now),
        "consume invitation",
    )?;
    if consumed != 1 {
        return Err(ServiceError::Gone(
            "this invitation has already been accepted".into(),
        ));
    }

    if workspaces::role_of(&tx, &row.workspace_id, &user.user_id)?.is_some() {
        tx.commit()
            .map_err(ServiceError::from_db("commit accept invitation"))?;
        return Err(ServiceError::Conflict(
            "you are already a member of this workspace".into(),
        ));
    }
    exec(
        &tx,
        db::workspaces::insert_member(&row.workspace_id, &user.user_id, row.role.as_str()),
        "add member",
    )?;
    tx.commit()
        .map_err(ServiceError::from_db("commit accept invitation"))?;

    tracing::info!(invitation_id = %row.id, user_id = %user.user_id, "invitation accepted");
    Ok(AcceptInvitationResponse {
        workspace_id: row.workspace_id,
        workspace_slug: row.workspace_slug,
        role: row.role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{Fixture, fixture, user};
    use tinta_api::CreateWorkspaceRequest;

    fn setup() -> (Fixture, AuthUser, String) {
        let fx = fixture();
        let ada = user(&fx, "u1", "ada@example.com");
        let id = {
            let conn = fx.db.conn();
            workspaces::create(
                &conn,
                &fx.config,
                &ada,
                &CreateWorkspaceRequest {
                    name: "Acme".into(),
                    slug: None,
                    description: None,
                },
            )
            .unwrap()
            .workspace
            .id
        };
        (fx, ada, id)
    }

    fn invite(email: &str) -> CreateInvitationRequest {
        CreateInvitationRequest {
            email: email.into(),
            role: None,
        }
    }

    fn expire_all(conn: &Connection) {
        conn.execute(
            "UPDATE workspace_invitations SET expires_at = '2000-01-01 00:00:00'",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_create_and_accept() {
        let (fx, ada, ws) = setup();
        let bob = user(&fx, "u2", "bob@example.com");
        let conn = fx.db.conn();

        let issued = create(&conn, &fx.config, &ws, &ada, &invite("Bob@Example.com")).unwrap();
        assert_eq!(issued.invitation.email, "bob@example.com");
        assert_eq!(issued.invitation.status, InvitationStatus::Pending);
        assert_eq!(issued.invitation.role, WorkspaceRole::Member);
        assert_eq!(issued.workspace_name, "Acme");
        assert_eq!(list_for_user(&conn, &bob).unwrap().len(), 1);

        let looked = lookup(&conn, &issued.token).unwrap();
        assert_eq!(looked.workspace_slug, "acme");
        assert_eq!(looked.status, InvitationStatus::Pending);

        let accepted = accept(&conn, &issued.token, &bob).unwrap();
        assert_eq!(accepted.workspace_id, ws);
        assert_eq!(
            workspaces::role_of(&conn, &ws, "u2").unwrap(),
            Some(WorkspaceRole::Member)
        );

        let err = accept(&conn, &issued.token, &bob).unwrap_err();
        assert_eq!(err.status_code(), 410);
        assert_eq!(err.message(), "this invitation has already been accepted");
        assert_eq!(
            lookup(&conn, &issued.token).unwrap().status,
            InvitationStatus::Accepted
        );
        assert!(list_for_user(&conn, &bob).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_invitations_rejected() {
        let (fx, ada, ws) = setup();
        let conn = fx.db.conn();

        let err = create(&conn, &fx.config, &ws, &ada, &invite("ada@example.com")).unwrap_err();
        assert_eq!(err.status_code(), 409);

        create(&conn, &fx.config, &ws, &ada, &invite("bob@example.com")).unwrap();
        let err = create(&conn, &fx.config, &ws, &ada, &invite("bob@example.com")).unwrap_err();
        assert_eq!(err.status_code(), 409);

        // An expired invitation does not block a new one.
        expire_all(&conn);
        create(&conn, &fx.config, &ws, &ada, &invite("bob@example.com")).unwrap();
    }

    #[test]
    fn test_expired_and_canceled_are_distinct() {
        let (fx, ada, ws) = setup();
        let bob = user(&fx, "u2", "bob@example.com");
        let conn = fx.db.conn();

        let first = create(&conn, &fx.config, &ws, &ada, &invite("bob@example.com")).unwrap();
        expire_all(&conn);
        let err = accept(&conn, &first.token, &bob).unwrap_err();
        assert_eq!(err.status_code(), 410);
        assert_eq!(err.message(), "this invitation has expired");
        let listed = list_for_workspace(&conn, &ws, &ada).unwrap();
        assert_eq!(listed[0].status, InvitationStatus::Expired);

        let second = create(&conn, &fx.config, &ws, &ada, &invite("bob@example.com")).unwrap();
        cancel(&conn, &ws, &second.invitation.id, &ada).unwrap();
        let err = accept(&conn, &second.token, &bob).unwrap_err();
        assert_eq!(err.status_code(), 410);
        assert_eq!(err.message(), "this invitation was canceled");
        assert_eq!(
            cancel(&conn, &ws, &second.invitation.id, &ada)
                .unwrap_err()
                .status_code(),
            409
        );

        assert_eq!(lookup(&conn, "nope").unwrap_err().status_code(), 404);
    }

    #[test]
    fn test_wrong_recipient_and_existing_member() {
        let (fx, ada, ws) = setup();
        let eve = user(&fx, "u3", "eve@example.com");
        let bob = user(&fx, "u2", "bob@example.com");
        let conn = fx.db.conn();

        let issued = create(&conn, &fx.config, &ws, &ada, &invite("bob@example.com")).unwrap();
        let err = accept(&conn, &issued.token, &eve).unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert_eq!(lookup(&conn, &issued.token).unwrap().status, InvitationStatus::Pending);

        // Bob joins some other way, then tries the link: consumed, 409.
        exec(&conn, db::workspaces::insert_member(&ws, "u2", "member"), "add").unwrap();
        let err = accept(&conn, &issued.token, &bob).unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert_eq!(
            lookup(&conn, &issued.token).unwrap().status,
            InvitationStatus::Accepted
        );
    }

    #[test]
    fn test_resend_rotates_token() {
        let (fx, ada, ws) = setup();
        let bob = user(&fx, "u2", "bob@example.com");
        let conn = fx.db.conn();

        let issued = create(&conn, &fx.config, &ws, &ada, &invite("bob@example.com")).unwrap();
        expire_all(&conn);
        let resent = resend(&conn, &fx.config, &ws, &issued.invitation.id, &ada).unwrap();
        assert_ne!(resent.token, issued.token);
        assert_eq!(resent.invitation.status, InvitationStatus::Pending);
        assert_eq!(lookup(&conn, &issued.token).unwrap_err().status_code(), 404);

        let accepted = accept(&conn, &resent.token, &bob).unwrap();
        assert_eq!(accepted.role, WorkspaceRole::Member);
        let err = resend(&conn, &fx.config, &ws, &issued.invitation.id, &ada).unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn test_members_cannot_manage_invitations() {
        let (fx, _ada, ws) = setup();
        let bob = user(&fx, "u2", "bob@example.com");
        let conn = fx.db.conn();
        exec(&conn, db::workspaces::insert_member(&ws, "u2", "member"), "add").unwrap();

        let err = create(&conn, &fx.config, &ws, &bob, &invite("x@example.com")).unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert_eq!(list_for_workspace(&conn, &ws, &bob).unwrap_err().status_code(), 403);
    }
}
