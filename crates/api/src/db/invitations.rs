//! Workspace invitation query builders.

use sea_query::{Asterisk, Expr, Func, Order, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::{WorkspaceInvitations as Inv, Workspaces};

/// Invitation joined with its workspace.
///
/// Column order: id, workspace_id, workspace_name, workspace_slug, email,
/// role, status, invited_by, expires_at, created_at.
fn invitation_select() -> sea_query::SelectStatement {
    Query::select()
        .column((Inv::Table, Inv::Id))
        .column((Inv::Table, Inv::WorkspaceId))
        .column((Workspaces::Table, Workspaces::Name))
        .column((Workspaces::Table, Workspaces::Slug))
        .column((Inv::Table, Inv::Email))
        .column((Inv::Table, Inv::Role))
        .column((Inv::Table, Inv::Status))
        .column((Inv::Table, Inv::InvitedBy))
        .column((Inv::Table, Inv::ExpiresAt))
        .column((Inv::Table, Inv::CreatedAt))
        .from(Inv::Table)
        .inner_join(
            Workspaces::Table,
            Expr::col((Workspaces::Table, Workspaces::Id)).equals((Inv::Table, Inv::WorkspaceId)),
        )
        .to_owned()
}

pub struct InsertParams<'a> {
    pub id: &'a str,
    pub workspace_id: &'a str,
    pub email: &'a str,
    pub role: &'a str,
    pub token: &'a str,
    pub invited_by: &'a str,
    pub expires_at: &'a str,
}

pub fn insert(p: &InsertParams<'_>) -> Built {
    Query::insert()
        .into_table(Inv::Table)
        .columns([
            Inv::Id,
            Inv::WorkspaceId,
            Inv::Email,
            Inv::Role,
            Inv::Token,
            Inv::InvitedBy,
            Inv::ExpiresAt,
        ])
        .values_panic([
            p.id.into(),
            p.workspace_id.into(),
            p.email.into(),
            p.role.into(),
            p.token.into(),
            p.invited_by.into(),
            p.expires_at.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Scoped to the workspace so ids from other workspaces never match.
pub fn get_in_workspace(workspace_id: &str, id: &str) -> Built {
    invitation_select()
        .and_where(Expr::col((Inv::Table, Inv::WorkspaceId)).eq(workspace_id))
        .and_where(Expr::col((Inv::Table, Inv::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn get_by_token(token: &str) -> Built {
    invitation_select()
        .and_where(Expr::col((Inv::Table, Inv::Token)).eq(token))
        .build(SqliteQueryBuilder)
}

pub fn list_for_workspace(workspace_id: &str) -> Built {
    invitation_select()
        .and_where(Expr::col((Inv::Table, Inv::WorkspaceId)).eq(workspace_id))
        .order_by((Inv::Table, Inv::CreatedAt), Order::Desc)
        .build(SqliteQueryBuilder)
}

/// Pending invitations addressed to `email` that have not expired at `now`.
pub fn list_pending_for_email(email: &str, now: &str) -> Built {
    invitation_select()
        .and_where(Expr::col((Inv::Table, Inv::Email)).eq(email))
        .and_where(Expr::col((Inv::Table, Inv::Status)).eq("pending"))
        .and_where(Expr::col((Inv::Table, Inv::ExpiresAt)).gt(now))
        .order_by((Inv::Table, Inv::CreatedAt), Order::Desc)
        .build(SqliteQueryBuilder)
}

/// Single `bool` column: does a live pending invitation exist for this email.
pub fn pending_exists(workspace_id: &str, email: &str, now: &str) -> Built {
    Query::select()
        .expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(Inv::Table)
        .and_where(Expr::col(Inv::WorkspaceId).eq(workspace_id))
        .and_where(Expr::col(Inv::Email).eq(email))
        .and_where(Expr::col(Inv::Status).eq("pending"))
        .and_where(Expr::col(Inv::ExpiresAt).gt(now))
        .build(SqliteQueryBuilder)
}

pub fn cancel(id: &str) -> Built {
    Query::update()
        .table(Inv::Table)
        .value(Inv::Status, "canceled")
        .and_where(Expr::col(Inv::Id).eq(id))
        .and_where(Expr::col(Inv::Status).eq("pending"))
        .build(SqliteQueryBuilder)
}

/// Issue a fresh token and expiry; the old link stops working.
pub fn rotate_token(id: &str, token: &str, expires_at: &str) -> Built {
    Query::update()
        .table(Inv::Table)
        .value(Inv::Token, token)
        .value(Inv::ExpiresAt, expires_at)
        .and_where(Expr::col(Inv::Id).eq(id))
        .and_where(Expr::col(Inv::Status).eq("pending"))
        .build(SqliteQueryBuilder)
}

/// Consume a pending, unexpired invitation. Affects zero rows when another
/// request already consumed it.
pub fn mark_accepted(id: &str, user_id: &str, now: &str) -> Built {
    Query::update()
        .table(Inv::Table)
        .value(Inv::Status, "accepted")
        .value(Inv::AcceptedBy, user_id)
        .value(Inv::AcceptedAt, now)
        .and_where(Expr::col(Inv::Id).eq(id))
        .and_where(Expr::col(Inv::Status).eq("pending"))
        .and_where(Expr::col(Inv::ExpiresAt).gt(now))
        .build(SqliteQueryBuilder)
}

pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Inv::Table)
        .and_where(Expr::col(Inv::Id).eq(id))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_accepted_guards_status_and_expiry() {
        let (sql, values) = mark_accepted("inv1", "u1", "2025-01-01 00:00:00");
        assert!(sql.contains(r#""status" = ?"#));
        assert!(sql.contains(r#""expires_at" > ?"#));
        // status, accepted_by, accepted_at, id, 'pending', now
        assert_eq!(values.0.len(), 6);
    }
}
