//! Workspace + member query builders.

use sea_query::{Alias, Asterisk, Expr, Func, Order, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::{Users, WorkspaceUsers, Workspaces};

// ── Workspace columns helper ──────────────────────────────────────────────

/// Column order: id, slug, name, description, image_key, created_by,
/// created_at, updated_at.
fn workspace_columns(q: &mut sea_query::SelectStatement) -> &mut sea_query::SelectStatement {
    q.column((Workspaces::Table, Workspaces::Id))
        .column((Workspaces::Table, Workspaces::Slug))
        .column((Workspaces::Table, Workspaces::Name))
        .column((Workspaces::Table, Workspaces::Description))
        .column((Workspaces::Table, Workspaces::ImageKey))
        .column((Workspaces::Table, Workspaces::CreatedBy))
        .column((Workspaces::Table, Workspaces::CreatedAt))
        .column((Workspaces::Table, Workspaces::UpdatedAt))
}

// ── Workspace queries ─────────────────────────────────────────────────────

pub fn insert(
    id: &str,
    slug: &str,
    name: &str,
    description: Option<&str>,
    created_by: &str,
) -> Built {
    Query::insert()
        .into_table(Workspaces::Table)
        .columns([
            Workspaces::Id,
            Workspaces::Slug,
            Workspaces::Name,
            Workspaces::Description,
            Workspaces::CreatedBy,
        ])
        .values_panic([
            id.into(),
            slug.into(),
            name.into(),
            description.map(str::to_string).into(),
            created_by.into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(id: &str) -> Built {
    let mut q = Query::select().to_owned();
    workspace_columns(&mut q);
    q.from(Workspaces::Table)
        .and_where(Expr::col((Workspaces::Table, Workspaces::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn get_by_slug(slug: &str) -> Built {
    let mut q = Query::select().to_owned();
    workspace_columns(&mut q);
    q.from(Workspaces::Table)
        .and_where(Expr::col((Workspaces::Table, Workspaces::Slug)).eq(slug))
        .build(SqliteQueryBuilder)
}

/// Single `bool` column: is the slug taken.
pub fn slug_exists(slug: &str) -> Built {
    Query::select()
        .expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(Workspaces::Table)
        .and_where(Expr::col(Workspaces::Slug).eq(slug))
        .build(SqliteQueryBuilder)
}

/// Every workspace, newest first. Superadmin view.
pub fn list_all() -> Built {
    let mut q = Query::select().to_owned();
    workspace_columns(&mut q);
    q.from(Workspaces::Table)
        .order_by((Workspaces::Table, Workspaces::CreatedAt), Order::Desc)
        .build(SqliteQueryBuilder)
}

/// Workspaces a user belongs to, newest first.
pub fn list_for_user(user_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    workspace_columns(&mut q);
    q.from(Workspaces::Table)
        .inner_join(
            WorkspaceUsers::Table,
            Expr::col((WorkspaceUsers::Table, WorkspaceUsers::WorkspaceId))
                .equals((Workspaces::Table, Workspaces::Id)),
        )
        .and_where(Expr::col((WorkspaceUsers::Table, WorkspaceUsers::UserId)).eq(user_id))
        .order_by((Workspaces::Table, Workspaces::CreatedAt), Order::Desc)
        .build(SqliteQueryBuilder)
}

/// Overwrite name and description. The slug column is never updated.
pub fn update(id: &str, name: &str, description: Option<&str>) -> Built {
    Query::update()
        .table(Workspaces::Table)
        .value(Workspaces::Name, name)
        .value(Workspaces::Description, description.map(str::to_string))
        .value(Workspaces::UpdatedAt, Expr::cust("datetime('now')"))
        .and_where(Expr::col(Workspaces::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn set_image_key(id: &str, image_key: &str) -> Built {
    Query::update()
        .table(Workspaces::Table)
        .value(Workspaces::ImageKey, image_key)
        .value(Workspaces::UpdatedAt, Expr::cust("datetime('now')"))
        .and_where(Expr::col(Workspaces::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Workspaces::Table)
        .and_where(Expr::col(Workspaces::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Column order: member_count, form_count.
pub fn counts(id: &str) -> Built {
    Query::select()
        .expr_as(
            Expr::cust_with_values(
                "(SELECT COUNT(*) FROM workspace_users WHERE workspace_id = ?)",
                [id],
            ),
            Alias::new("member_count"),
        )
        .expr_as(
            Expr::cust_with_values("(SELECT COUNT(*) FROM forms WHERE workspace_id = ?)", [id]),
            Alias::new("form_count"),
        )
        .build(SqliteQueryBuilder)
}

// ── Member queries ────────────────────────────────────────────────────────

pub fn insert_member(workspace_id: &str, user_id: &str, role: &str) -> Built {
    Query::insert()
        .into_table(WorkspaceUsers::Table)
        .columns([
            WorkspaceUsers::WorkspaceId,
            WorkspaceUsers::UserId,
            WorkspaceUsers::Role,
        ])
        .values_panic([workspace_id.into(), user_id.into(), role.into()])
        .build(SqliteQueryBuilder)
}

/// Single column: role.
pub fn member_role(workspace_id: &str, user_id: &str) -> Built {
    Query::select()
        .column(WorkspaceUsers::Role)
        .from(WorkspaceUsers::Table)
        .and_where(Expr::col(WorkspaceUsers::WorkspaceId).eq(workspace_id))
        .and_where(Expr::col(WorkspaceUsers::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Column order: user_id, email, name, image_key, role, joined_at.
pub fn list_members(workspace_id: &str) -> Built {
    Query::select()
        .column((WorkspaceUsers::Table, WorkspaceUsers::UserId))
        .column((Users::Table, Users::Email))
        .column((Users::Table, Users::Name))
        .column((Users::Table, Users::ImageKey))
        .column((WorkspaceUsers::Table, WorkspaceUsers::Role))
        .column((WorkspaceUsers::Table, WorkspaceUsers::JoinedAt))
        .from(WorkspaceUsers::Table)
        .inner_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id))
                .equals((WorkspaceUsers::Table, WorkspaceUsers::UserId)),
        )
        .and_where(
            Expr::col((WorkspaceUsers::Table, WorkspaceUsers::WorkspaceId)).eq(workspace_id),
        )
        .order_by((WorkspaceUsers::Table, WorkspaceUsers::JoinedAt), Order::Asc)
        .build(SqliteQueryBuilder)
}

pub fn update_member_role(workspace_id: &str, user_id: &str, role: &str) -> Built {
    Query::update()
        .table(WorkspaceUsers::Table)
        .value(WorkspaceUsers::Role, role)
        .and_where(Expr::col(WorkspaceUsers::WorkspaceId).eq(workspace_id))
        .and_where(Expr::col(WorkspaceUsers::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

pub fn delete_member(workspace_id: &str, user_id: &str) -> Built {
    Query::delete()
        .from_table(WorkspaceUsers::Table)
        .and_where(Expr::col(WorkspaceUsers::WorkspaceId).eq(workspace_id))
        .and_where(Expr::col(WorkspaceUsers::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Single column: number of admins.
pub fn count_admins(workspace_id: &str) -> Built {
    Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(WorkspaceUsers::Table)
        .and_where(Expr::col(WorkspaceUsers::WorkspaceId).eq(workspace_id))
        .and_where(Expr::col(WorkspaceUsers::Role).eq("admin"))
        .build(SqliteQueryBuilder)
}

/// Single `bool` column: is `email` already a member.
pub fn email_is_member(workspace_id: &str, email: &str) -> Built {
    Query::select()
        .expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(WorkspaceUsers::Table)
        .inner_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id))
                .equals((WorkspaceUsers::Table, WorkspaceUsers::UserId)),
        )
        .and_where(
            Expr::col((WorkspaceUsers::Table, WorkspaceUsers::WorkspaceId)).eq(workspace_id),
        )
        .and_where(Expr::col((Users::Table, Users::Email)).eq(email))
        .build(SqliteQueryBuilder)
}

/// Single column: email of every admin, for submission notifications.
pub fn admin_emails(workspace_id: &str) -> Built {
    Query::select()
        .column((Users::Table, Users::Email))
        .from(WorkspaceUsers::Table)
        .inner_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id))
                .equals((WorkspaceUsers::Table, WorkspaceUsers::UserId)),
        )
        .and_where(
            Expr::col((WorkspaceUsers::Table, WorkspaceUsers::WorkspaceId)).eq(workspace_id),
        )
        .and_where(Expr::col((WorkspaceUsers::Table, WorkspaceUsers::Role)).eq("admin"))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_never_touches_slug() {
        let (sql, _) = update("ws1", "Acme", None);
        assert!(!sql.contains("slug"));
        assert!(sql.contains(r#""updated_at" = datetime('now')"#));
    }

    #[test]
    fn test_counts_binds_workspace_twice() {
        let (sql, values) = counts("ws1");
        assert!(sql.contains("member_count"));
        assert!(sql.contains("form_count"));
        assert_eq!(values.0.len(), 2);
    }
}
