//! Form response + attachment query builders.

use sea_query::{Alias, Asterisk, Expr, Func, Order, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::{FormResponseFiles as Files, FormResponses, Forms};

// ── Responses ──────────────────────────────────────────────────────────────

pub struct InsertParams<'a> {
    pub id: &'a str,
    pub form_id: &'a str,
    pub data: &'a str,
    pub respondent_email: Option<&'a str>,
    pub respondent_key: Option<&'a str>,
    pub metadata: &'a str,
    pub created_at: &'a str,
}

pub fn insert(p: &InsertParams<'_>) -> Built {
    Query::insert()
        .into_table(FormResponses::Table)
        .columns([
            FormResponses::Id,
            FormResponses::FormId,
            FormResponses::Data,
            FormResponses::RespondentEmail,
            FormResponses::RespondentKey,
            FormResponses::Metadata,
            FormResponses::CreatedAt,
            FormResponses::UpdatedAt,
        ])
        .values_panic([
            p.id.into(),
            p.form_id.into(),
            p.data.into(),
            p.respondent_email.map(str::to_string).into(),
            p.respondent_key.map(str::to_string).into(),
            p.metadata.into(),
            p.created_at.into(),
            p.created_at.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Response joined with its form.
///
/// Column order: id, form_id, form_title, workspace_id, status,
/// respondent_email, data, metadata, created_at, updated_at.
pub fn get_by_id(id: &str) -> Built {
    Query::select()
        .column((FormResponses::Table, FormResponses::Id))
        .column((FormResponses::Table, FormResponses::FormId))
        .column((Forms::Table, Forms::Title))
        .column((Forms::Table, Forms::WorkspaceId))
        .column((FormResponses::Table, FormResponses::Status))
        .column((FormResponses::Table, FormResponses::RespondentEmail))
        .column((FormResponses::Table, FormResponses::Data))
        .column((FormResponses::Table, FormResponses::Metadata))
        .column((FormResponses::Table, FormResponses::CreatedAt))
        .column((FormResponses::Table, FormResponses::UpdatedAt))
        .from(FormResponses::Table)
        .inner_join(
            Forms::Table,
            Expr::col((Forms::Table, Forms::Id))
                .equals((FormResponses::Table, FormResponses::FormId)),
        )
        .and_where(Expr::col((FormResponses::Table, FormResponses::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

fn filtered(
    q: &mut sea_query::SelectStatement,
    form_id: &str,
    status: Option<&str>,
) -> sea_query::SelectStatement {
    q.and_where(Expr::col((FormResponses::Table, FormResponses::FormId)).eq(form_id));
    if let Some(status) = status {
        q.and_where(Expr::col((FormResponses::Table, FormResponses::Status)).eq(status));
    }
    q.to_owned()
}

/// Paginated listing, newest first.
///
/// Column order: id, form_id, status, respondent_email, data, created_at,
/// updated_at, file_count.
pub fn list(form_id: &str, status: Option<&str>, limit: u32, offset: u32) -> Built {
    let mut q = Query::select()
        .column((FormResponses::Table, FormResponses::Id))
        .column((FormResponses::Table, FormResponses::FormId))
        .column((FormResponses::Table, FormResponses::Status))
        .column((FormResponses::Table, FormResponses::RespondentEmail))
        .column((FormResponses::Table, FormResponses::Data))
        .column((FormResponses::Table, FormResponses::CreatedAt))
        .column((FormResponses::Table, FormResponses::UpdatedAt))
        .expr_as(
            Expr::cust(
                "(SELECT COUNT(*) FROM form_response_files f \
                 WHERE f.response_id = form_responses.id)",
            ),
            Alias::new("file_count"),
        )
        .from(FormResponses::Table)
        .to_owned();
    filtered(&mut q, form_id, status)
        .order_by((FormResponses::Table, FormResponses::CreatedAt), Order::Desc)
        .order_by((FormResponses::Table, FormResponses::Id), Order::Asc)
        .limit(u64::from(limit))
        .offset(u64::from(offset))
        .build(SqliteQueryBuilder)
}

/// Single column: total for the same filter as [`list`].
pub fn count(form_id: &str, status: Option<&str>) -> Built {
    let mut q = Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(FormResponses::Table)
        .to_owned();
    filtered(&mut q, form_id, status).build(SqliteQueryBuilder)
}

/// Single `bool` column: has this respondent already answered the form.
pub fn respondent_exists(form_id: &str, respondent_key: &str) -> Built {
    Query::select()
        .expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(FormResponses::Table)
        .and_where(Expr::col(FormResponses::FormId).eq(form_id))
        .and_where(Expr::col(FormResponses::RespondentKey).eq(respondent_key))
        .build(SqliteQueryBuilder)
}

pub fn update_status(id: &str, status: &str) -> Built {
    Query::update()
        .table(FormResponses::Table)
        .value(FormResponses::Status, status)
        .value(FormResponses::UpdatedAt, Expr::cust("datetime('now')"))
        .and_where(Expr::col(FormResponses::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(FormResponses::Table)
        .and_where(Expr::col(FormResponses::Id).eq(id))
        .build(SqliteQueryBuilder)
}

// ── Attachments ────────────────────────────────────────────────────────────

pub struct FileInsertParams<'a> {
    pub id: &'a str,
    pub response_id: &'a str,
    pub field_id: &'a str,
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub size_bytes: i64,
    pub storage_key: &'a str,
}

pub fn insert_file(p: &FileInsertParams<'_>) -> Built {
    Query::insert()
        .into_table(Files::Table)
        .columns([
            Files::Id,
            Files::ResponseId,
            Files::FieldId,
            Files::FileName,
            Files::ContentType,
            Files::SizeBytes,
            Files::StorageKey,
        ])
        .values_panic([
            p.id.into(),
            p.response_id.into(),
            p.field_id.into(),
            p.file_name.into(),
            p.content_type.into(),
            p.size_bytes.into(),
            p.storage_key.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Column order: id, field_id, file_name, content_type, size_bytes,
/// storage_key.
fn file_select() -> sea_query::SelectStatement {
    Query::select()
        .columns([
            Files::Id,
            Files::FieldId,
            Files::FileName,
            Files::ContentType,
            Files::SizeBytes,
            Files::StorageKey,
        ])
        .from(Files::Table)
        .to_owned()
}

pub fn list_files(response_id: &str) -> Built {
    file_select()
        .and_where(Expr::col(Files::ResponseId).eq(response_id))
        .order_by(Files::CreatedAt, Order::Asc)
        .order_by(Files::FieldId, Order::Asc)
        .build(SqliteQueryBuilder)
}

pub fn get_file(response_id: &str, file_id: &str) -> Built {
    file_select()
        .and_where(Expr::col(Files::ResponseId).eq(response_id))
        .and_where(Expr::col(Files::Id).eq(file_id))
        .build(SqliteQueryBuilder)
}

/// Single column: storage key of every attachment in a workspace. Collected
/// before the workspace row cascades away.
pub fn storage_keys_for_workspace(workspace_id: &str) -> Built {
    Query::select()
        .column((Files::Table, Files::StorageKey))
        .from(Files::Table)
        .inner_join(
            FormResponses::Table,
            Expr::col((FormResponses::Table, FormResponses::Id))
                .equals((Files::Table, Files::ResponseId)),
        )
        .inner_join(
            Forms::Table,
            Expr::col((Forms::Table, Forms::Id))
                .equals((FormResponses::Table, FormResponses::FormId)),
        )
        .and_where(Expr::col((Forms::Table, Forms::WorkspaceId)).eq(workspace_id))
        .build(SqliteQueryBuilder)
}
