//! Reusable form templates. Global, owned by their creator.

use rusqlite::{Connection, Row};

use tinta_api::{
    CreateTemplateRequest, FieldDescriptor, ServiceError, TemplateResponse, UpdateTemplateRequest,
    db, service,
};
use tinta_core::FieldSchema;

use crate::auth::AuthUser;
use crate::storage::{exec, query_all, query_opt};

fn template_from_row(row: &Row<'_>) -> rusqlite::Result<TemplateResponse> {
    let raw_fields: String = row.get(3)?;
    Ok(TemplateResponse {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        fields: FieldSchema::from_json(&raw_fields)
            .map(FieldSchema::into_fields)
            .unwrap_or_default(),
        created_by: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub(crate) fn load(conn: &Connection, id: &str) -> Result<TemplateResponse, ServiceError> {
    query_opt(conn, db::templates::get_by_id(id), "load template", template_from_row)?
        .ok_or_else(|| ServiceError::NotFound("template not found".into()))
}

fn ensure_owner(template: &TemplateResponse, user: &AuthUser) -> Result<(), ServiceError> {
    if template.created_by != user.user_id && !user.is_superadmin() {
        return Err(ServiceError::Forbidden(
            "only the template creator can change it".into(),
        ));
    }
    Ok(())
}

fn checked_schema(fields: Vec<FieldDescriptor>) -> Result<FieldSchema, ServiceError> {
    let schema = FieldSchema::new(fields);
    schema.validate()?;
    Ok(schema)
}

pub fn create(
    conn: &Connection,
    user: &AuthUser,
    req: CreateTemplateRequest,
) -> Result<TemplateResponse, ServiceError> {
    let name = service::validate_template_name(&req.name)?;
    let description = service::normalize_description(req.description.as_deref())?;
    let schema = checked_schema(req.fields)?;

    let id = uuid::Uuid::new_v4().to_string();
    exec(
        conn,
        db::templates::insert(
            &id,
            &name,
            description.as_deref(),
            &schema.to_json(),
            &user.user_id,
        ),
        "create template",
    )?;
    tracing::info!(template_id = %id, fields = schema.len(), "template created");
    load(conn, &id)
}

pub fn list(conn: &Connection) -> Result<Vec<TemplateResponse>, ServiceError> {
    query_all(conn, db::templates::list(), "list templates", template_from_row)
}

pub fn get(conn: &Connection, id: &str) -> Result<TemplateResponse, ServiceError> {
    load(conn, id)
}

pub fn update(
    conn: &Connection,
    id: &str,
    user: &AuthUser,
    req: UpdateTemplateRequest,
) -> Result<TemplateResponse, ServiceError> {
    let current = load(conn, id)?;
    ensure_owner(&current, user)?;

    let name = match req.name.as_deref() {
        Some(n) => service::validate_template_name(n)?,
        None => current.name,
    };
    let description = match req.description.as_deref() {
        Some(d) => service::normalize_description(Some(d))?,
        None => current.description,
    };
    let schema = checked_schema(req.fields.unwrap_or(current.fields))?;

    exec(
        conn,
        db::templates::update(id, &name, description.as_deref(), &schema.to_json()),
        "update template",
    )?;
    load(conn, id)
}

pub fn reorder_fields(
    conn: &Connection,
    id: &str,
    user: &AuthUser,
    field_ids: &[String],
) -> Result<TemplateResponse, ServiceError> {
    let current = load(conn, id)?;
    ensure_owner(&current, user)?;
    let mut schema = FieldSchema::new(current.fields);
    schema.reorder(field_ids)?;
    exec(
        conn,
        db::templates::update(
            id,
            &current.name,
            current.description.as_deref(),
            &schema.to_json(),
        ),
        "reorder template fields",
    )?;
    load(conn, id)
}

/// Forms created from the template keep their own copy of the fields.
pub fn delete(conn: &Connection, id: &str, user: &AuthUser) -> Result<(), ServiceError> {
    let current = load(conn, id)?;
    ensure_owner(&current, user)?;
    exec(conn, db::templates::delete(id), "delete template")?;
    tracing::info!(template_id = %id, "template deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{fixture, superadmin, user};

    fn contact_request() -> CreateTemplateRequest {
        CreateTemplateRequest {
            name: "Contact".into(),
            description: Some("  Reach out  ".into()),
            fields: tinta_core::testing::contact_schema().into_fields(),
        }
    }

    #[test]
    fn test_create_and_list() {
        let fx = fixture();
        let ada = user(&fx, "u1", "ada@example.com");
        let conn = fx.db.conn();

        let t = create(&conn, &ada, contact_request()).unwrap();
        assert_eq!(t.description.as_deref(), Some("Reach out"));
        assert_eq!(t.fields.len(), 5);
        assert_eq!(t.created_by, "u1");

        create(
            &conn,
            &ada,
            CreateTemplateRequest {
                name: "Blank".into(),
                description: None,
                fields: vec![],
            },
        )
        .unwrap();
        let names: Vec<String> = list(&conn).unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, ["Blank", "Contact"]);
    }

    #[test]
    fn test_invalid_fields_rejected() {
        let fx = fixture();
        let ada = user(&fx, "u1", "ada@example.com");
        let conn = fx.db.conn();

        let mut req = contact_request();
        req.fields.push(req.fields[0].clone());
        let err = create(&conn, &ada, req).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.message().contains("duplicate field id"));
    }

    #[test]
    fn test_only_creator_or_superadmin_may_edit() {
        let fx = fixture();
        let ada = user(&fx, "u1", "ada@example.com");
        let bob = user(&fx, "u2", "bob@example.com");
        let root = superadmin(&fx, "u3", "root@tinta.agency");
        let conn = fx.db.conn();
        let t = create(&conn, &ada, contact_request()).unwrap();

        let rename = || UpdateTemplateRequest {
            name: Some("Contact us".into()),
            ..Default::default()
        };
        assert_eq!(update(&conn, &t.id, &bob, rename()).unwrap_err().status_code(), 403);
        assert_eq!(delete(&conn, &t.id, &bob).unwrap_err().status_code(), 403);

        let updated = update(&conn, &t.id, &root, rename()).unwrap();
        assert_eq!(updated.name, "Contact us");
        assert_eq!(updated.fields.len(), 5);
        assert_eq!(updated.description.as_deref(), Some("Reach out"));

        delete(&conn, &t.id, &ada).unwrap();
        assert_eq!(load(&conn, &t.id).unwrap_err().status_code(), 404);
    }

    #[test]
    fn test_reorder_fields() {
        let fx = fixture();
        let ada = user(&fx, "u1", "ada@example.com");
        let conn = fx.db.conn();
        let t = create(&conn, &ada, contact_request()).unwrap();

        let order: Vec<String> = ["resume", "message", "topic", "email", "name"]
            .map(String::from)
            .to_vec();
        let t = reorder_fields(&conn, &t.id, &ada, &order).unwrap();
        let ids: Vec<&str> = t.fields.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["resume", "message", "topic", "email", "name"]);

        let err = reorder_fields(&conn, &t.id, &ada, &order[..2]).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
