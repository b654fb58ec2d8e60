//! Form query builders.

use sea_query::{Alias, Expr, Order, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::Forms;

// ── Helpers ────────────────────────────────────────────────────────────────

/// Column order: id, workspace_id, template_id, title, description, fields,
/// share_token, is_active, allow_multiple_submissions, notify_on_submission,
/// created_by, created_at, updated_at.
fn form_columns(q: &mut sea_query::SelectStatement) -> &mut sea_query::SelectStatement {
    q.column((Forms::Table, Forms::Id))
        .column((Forms::Table, Forms::WorkspaceId))
        .column((Forms::Table, Forms::TemplateId))
        .column((Forms::Table, Forms::Title))
        .column((Forms::Table, Forms::Description))
        .column((Forms::Table, Forms::Fields))
        .column((Forms::Table, Forms::ShareToken))
        .column((Forms::Table, Forms::IsActive))
        .column((Forms::Table, Forms::AllowMultipleSubmissions))
        .column((Forms::Table, Forms::NotifyOnSubmission))
        .column((Forms::Table, Forms::CreatedBy))
        .column((Forms::Table, Forms::CreatedAt))
        .column((Forms::Table, Forms::UpdatedAt))
}

fn form_select() -> sea_query::SelectStatement {
    let mut q = Query::select().to_owned();
    form_columns(&mut q);
    q.from(Forms::Table).to_owned()
}

// ── Queries ────────────────────────────────────────────────────────────────

/// Parameters for inserting a form.
pub struct InsertParams<'a> {
    pub id: &'a str,
    pub workspace_id: &'a str,
    pub template_id: Option<&'a str>,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub fields: &'a str,
    pub share_token: &'a str,
    pub allow_multiple_submissions: bool,
    pub notify_on_submission: bool,
    pub created_by: &'a str,
}

pub fn insert(p: &InsertParams<'_>) -> Built {
    Query::insert()
        .into_table(Forms::Table)
        .columns([
            Forms::Id,
            Forms::WorkspaceId,
            Forms::TemplateId,
            Forms::Title,
            Forms::Description,
            Forms::Fields,
            Forms::ShareToken,
            Forms::AllowMultipleSubmissions,
            Forms::NotifyOnSubmission,
            Forms::CreatedBy,
        ])
        .values_panic([
            p.id.into(),
            p.workspace_id.into(),
            p.template_id.map(str::to_string).into(),
            p.title.into(),
            p.description.map(str::to_string).into(),
            p.fields.into(),
            p.share_token.into(),
            p.allow_multiple_submissions.into(),
            p.notify_on_submission.into(),
            p.created_by.into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(id: &str) -> Built {
    form_select()
        .and_where(Expr::col((Forms::Table, Forms::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn get_by_share_token(token: &str) -> Built {
    form_select()
        .and_where(Expr::col((Forms::Table, Forms::ShareToken)).eq(token))
        .build(SqliteQueryBuilder)
}

/// Forms in a workspace, newest first, with two trailing count columns:
/// response_count, new_response_count.
pub fn list_for_workspace(workspace_id: &str) -> Built {
    form_select()
        .expr_as(
            Expr::cust("(SELECT COUNT(*) FROM form_responses r WHERE r.form_id = forms.id)"),
            Alias::new("response_count"),
        )
        .expr_as(
            Expr::cust(
                "(SELECT COUNT(*) FROM form_responses r \
                 WHERE r.form_id = forms.id AND r.status = 'new')",
            ),
            Alias::new("new_response_count"),
        )
        .and_where(Expr::col((Forms::Table, Forms::WorkspaceId)).eq(workspace_id))
        .order_by((Forms::Table, Forms::CreatedAt), Order::Desc)
        .build(SqliteQueryBuilder)
}

/// Parameters for a full settings update. The share token and fields have
/// their own builders.
pub struct UpdateParams<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub is_active: bool,
    pub allow_multiple_submissions: bool,
    pub notify_on_submission: bool,
}

pub fn update(p: &UpdateParams<'_>) -> Built {
    Query::update()
        .table(Forms::Table)
        .value(Forms::Title, p.title)
        .value(Forms::Description, p.description.map(str::to_string))
        .value(Forms::IsActive, p.is_active)
        .value(Forms::AllowMultipleSubmissions, p.allow_multiple_submissions)
        .value(Forms::NotifyOnSubmission, p.notify_on_submission)
        .value(Forms::UpdatedAt, Expr::cust("datetime('now')"))
        .and_where(Expr::col(Forms::Id).eq(p.id))
        .build(SqliteQueryBuilder)
}

pub fn set_fields(id: &str, fields: &str) -> Built {
    Query::update()
        .table(Forms::Table)
        .value(Forms::Fields, fields)
        .value(Forms::UpdatedAt, Expr::cust("datetime('now')"))
        .and_where(Expr::col(Forms::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn set_share_token(id: &str, token: &str) -> Built {
    Query::update()
        .table(Forms::Table)
        .value(Forms::ShareToken, token)
        .value(Forms::UpdatedAt, Expr::cust("datetime('now')"))
        .and_where(Expr::col(Forms::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Only deletes a form that has no responses; zero rows affected otherwise.
pub fn delete_if_unanswered(id: &str) -> Built {
    Query::delete()
        .from_table(Forms::Table)
        .and_where(Expr::col(Forms::Id).eq(id))
        .and_where(Expr::cust_with_values(
            "NOT EXISTS (SELECT 1 FROM form_responses WHERE form_id = ?)",
            [id],
        ))
        .build(SqliteQueryBuilder)
}
