//! Form template query builders.

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::FormTemplates;

/// Column order: id, name, description, fields, created_by, created_at,
/// updated_at.
fn template_select() -> sea_query::SelectStatement {
    Query::select()
        .columns([
            FormTemplates::Id,
            FormTemplates::Name,
            FormTemplates::Description,
            FormTemplates::Fields,
            FormTemplates::CreatedBy,
            FormTemplates::CreatedAt,
            FormTemplates::UpdatedAt,
        ])
        .from(FormTemplates::Table)
        .to_owned()
}

/// `fields` is the serialised field schema.
pub fn insert(
    id: &str,
    name: &str,
    description: Option<&str>,
    fields: &str,
    created_by: &str,
) -> Built {
    Query::insert()
        .into_table(FormTemplates::Table)
        .columns([
            FormTemplates::Id,
            FormTemplates::Name,
            FormTemplates::Description,
            FormTemplates::Fields,
            FormTemplates::CreatedBy,
        ])
        .values_panic([
            id.into(),
            name.into(),
            description.map(str::to_string).into(),
            fields.into(),
            created_by.into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(id: &str) -> Built {
    template_select()
        .and_where(Expr::col(FormTemplates::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn list() -> Built {
    template_select()
        .order_by(FormTemplates::Name, Order::Asc)
        .build(SqliteQueryBuilder)
}

pub fn update(id: &str, name: &str, description: Option<&str>, fields: &str) -> Built {
    Query::update()
        .table(FormTemplates::Table)
        .value(FormTemplates::Name, name)
        .value(FormTemplates::Description, description.map(str::to_string))
        .value(FormTemplates::Fields, fields)
        .value(FormTemplates::UpdatedAt, Expr::cust("datetime('now')"))
        .and_where(Expr::col(FormTemplates::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(FormTemplates::Table)
        .and_where(Expr::col(FormTemplates::Id).eq(id))
        .build(SqliteQueryBuilder)
}
