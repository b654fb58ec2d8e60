//! Forms: workspace-scoped, with their own snapshot of the field schema and a
//! public share token.

use rusqlite::{Connection, Row};

use tinta_api::{
    CreateFormRequest, FormInfo, FormListItem, PublicForm, ServiceError, ShareTokenResponse,
    UpdateFormRequest, crypto, db, service,
};
use tinta_core::FieldSchema;

use super::{require_admin, require_member, templates, workspaces};
use crate::auth::AuthUser;
use crate::config::AppConfig;
use crate::storage::{exec, query_all, query_one, query_opt};

/// A form row as stored.
#[derive(Debug, Clone)]
pub(crate) struct FormRow {
    pub id: String,
    pub workspace_id: String,
    pub template_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub schema: FieldSchema,
    pub share_token: String,
    pub is_active: bool,
    pub allow_multiple_submissions: bool,
    pub notify_on_submission: bool,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

fn form_from_row(row: &Row<'_>) -> rusqlite::Result<FormRow> {
    let raw_fields: String = row.get(5)?;
    Ok(FormRow {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        template_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        schema: FieldSchema::from_json(&raw_fields).unwrap_or_default(),
        share_token: row.get(6)?,
        is_active: row.get(7)?,
        allow_multiple_submissions: row.get(8)?,
        notify_on_submission: row.get(9)?,
        created_by: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

impl FormRow {
    pub fn into_info(self, config: &AppConfig) -> FormInfo {
        FormInfo {
            share_url: config.share_url(&self.share_token),
            id: self.id,
            workspace_id: self.workspace_id,
            template_id: self.template_id,
            title: self.title,
            description: self.description,
            fields: self.schema.into_fields(),
            share_token: self.share_token,
            is_active: self.is_active,
            allow_multiple_submissions: self.allow_multiple_submissions,
            notify_on_submission: self.notify_on_submission,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

pub(crate) fn load(conn: &Connection, form_id: &str) -> Result<FormRow, ServiceError> {
    query_opt(conn, db::forms::get_by_id(form_id), "load form", form_from_row)?
        .ok_or_else(|| ServiceError::NotFound("form not found".into()))
}

/// Load a form and check the caller belongs to its workspace.
pub(crate) fn load_for_member(
    conn: &Connection,
    form_id: &str,
    user: &AuthUser,
) -> Result<FormRow, ServiceError> {
    let form = load(conn, form_id)?;
    require_member(conn, &form.workspace_id, user)?;
    Ok(form)
}

/// Resolve a share token for a public visitor. Unknown links and closed forms
/// are distinct terminal states.
pub(crate) fn load_public(conn: &Connection, share_token: &str) -> Result<FormRow, ServiceError> {
    let form = query_opt(
        conn,
        db::forms::get_by_share_token(share_token),
        "load form",
        form_from_row,
    )?
    .ok_or_else(|| ServiceError::NotFound("form not found".into()))?;
    if !form.is_active {
        return Err(ServiceError::Gone(
            "this form is no longer accepting responses".into(),
        ));
    }
    Ok(form)
}

fn checked_schema(fields: Vec<tinta_api::FieldDescriptor>) -> Result<FieldSchema, ServiceError> {
    let schema = FieldSchema::new(fields);
    schema.validate()?;
    Ok(schema)
}

pub fn create(
    conn: &Connection,
    config: &AppConfig,
    workspace_id: &str,
    user: &AuthUser,
    req: CreateFormRequest,
) -> Result<FormInfo, ServiceError> {
    require_member(conn, workspace_id, user)?;

    let (template_id, title, fields) = match req.template_id.as_deref() {
        Some(tid) => {
            let template = templates::load(conn, tid)?;
            let title = req.title.unwrap_or_else(|| template.name.clone());
            (Some(template.id), title, template.fields)
        }
        None => {
            let title = req
                .title
                .ok_or_else(|| ServiceError::BadRequest("form title is required".into()))?;
            (None, title, req.fields.unwrap_or_default())
        }
    };
    let title = service::validate_form_title(&title)?;
    let description = service::normalize_description(req.description.as_deref())?;
    let schema = checked_schema(fields)?;

    let id = uuid::Uuid::new_v4().to_string();
    let share_token = crypto::generate_share_token()?;
    exec(
        conn,
        db::forms::insert(&db::forms::InsertParams {
            id: &id,
            workspace_id,
            template_id: template_id.as_deref(),
            title: &title,
            description: description.as_deref(),
            fields: &schema.to_json(),
            share_token: &share_token,
            allow_multiple_submissions: req.allow_multiple_submissions.unwrap_or(true),
            notify_on_submission: req.notify_on_submission.unwrap_or(true),
            created_by: &user.user_id,
        }),
        "create form",
    )?;
    tracing::info!(form_id = %id, %workspace_id, fields = schema.len(), "form created");
    Ok(load(conn, &id)?.into_info(config))
}

pub fn list_for_workspace(
    conn: &Connection,
    config: &AppConfig,
    workspace_id: &str,
    user: &AuthUser,
) -> Result<Vec<FormListItem>, ServiceError> {
    require_member(conn, workspace_id, user)?;
    let rows = query_all(
        conn,
        db::forms::list_for_workspace(workspace_id),
        "list forms",
        |row| {
            Ok((
                form_from_row(row)?,
                row.get::<_, i64>(13)?,
                row.get::<_, i64>(14)?,
            ))
        },
    )?;
    Ok(rows
        .into_iter()
        .map(|(form, response_count, new_response_count)| FormListItem {
            form: form.into_info(config),
            response_count,
            new_response_count,
        })
        .collect())
}

pub fn get(
    conn: &Connection,
    config: &AppConfig,
    form_id: &str,
    user: &AuthUser,
) -> Result<FormInfo, ServiceError> {
    Ok(load_for_member(conn, form_id, user)?.into_info(config))
}

pub fn update(
    conn: &Connection,
    config: &AppConfig,
    form_id: &str,
    user: &AuthUser,
    req: UpdateFormRequest,
) -> Result<FormInfo, ServiceError> {
    let current = load_for_member(conn, form_id, user)?;

    let title = match req.title.as_deref() {
        Some(t) => service::validate_form_title(t)?,
        None => current.title,
    };
    let description = match req.description.as_deref() {
        Some(d) => service::normalize_description(Some(d))?,
        None => current.description,
    };
    let schema = req.fields.map(checked_schema).transpose()?;

    let tx = conn
        .unchecked_transaction()
        .map_err(ServiceError::from_db("begin update form"))?;
    exec(
        &tx,
        db::forms::update(&db::forms::UpdateParams {
            id: form_id,
            title: &title,
            description: description.as_deref(),
            is_active: req.is_active.unwrap_or(current.is_active),
            allow_multiple_submissions: req
                .allow_multiple_submissions
                .unwrap_or(current.allow_multiple_submissions),
            notify_on_submission: req
                .notify_on_submission
                .unwrap_or(current.notify_on_submission),
        }),
        "update form",
    )?;
    if let Some(schema) = &schema {
        exec(&tx, db::forms::set_fields(form_id, &schema.to_json()), "update form fields")?;
    }
    tx.commit().map_err(ServiceError::from_db("commit update form"))?;

    Ok(load(conn, form_id)?.into_info(config))
}

fn save_schema(
    conn: &Connection,
    config: &AppConfig,
    form_id: &str,
    schema: &FieldSchema,
) -> Result<FormInfo, ServiceError> {
    exec(conn, db::forms::set_fields(form_id, &schema.to_json()), "update form fields")?;
    Ok(load(conn, form_id)?.into_info(config))
}

pub fn reorder_fields(
    conn: &Connection,
    config: &AppConfig,
    form_id: &str,
    user: &AuthUser,
    field_ids: &[String],
) -> Result<FormInfo, ServiceError> {
    let mut schema = load_for_member(conn, form_id, user)?.schema;
    schema.reorder(field_ids)?;
    save_schema(conn, config, form_id, &schema)
}

/// Drag-and-drop move of one field, by index.
pub fn move_field(
    conn: &Connection,
    config: &AppConfig,
    form_id: &str,
    user: &AuthUser,
    from: usize,
    to: usize,
) -> Result<FormInfo, ServiceError> {
    let mut schema = load_for_member(conn, form_id, user)?.schema;
    schema.move_field(from, to)?;
    save_schema(conn, config, form_id, &schema)
}

/// The previous link stops working immediately.
pub fn regenerate_share_token(
    conn: &Connection,
    config: &AppConfig,
    form_id: &str,
    user: &AuthUser,
) -> Result<ShareTokenResponse, ServiceError> {
    load_for_member(conn, form_id, user)?;
    let share_token = crypto::generate_share_token()?;
    exec(
        conn,
        db::forms::set_share_token(form_id, &share_token),
        "rotate share token",
    )?;
    tracing::info!(%form_id, "share token regenerated");
    Ok(ShareTokenResponse {
        share_url: config.share_url(&share_token),
        share_token,
    })
}

/// Forms that already collected responses cannot be deleted.
pub fn delete(conn: &Connection, form_id: &str, user: &AuthUser) -> Result<(), ServiceError> {
    let form = load(conn, form_id)?;
    require_admin(conn, &form.workspace_id, user)?;

    let responses = query_one(
        conn,
        db::responses::count(form_id, None),
        "count responses",
        |r| r.get::<_, i64>(0),
    )?;
    let conflict = || {
        ServiceError::Conflict(format!(
            "form has {responses} response(s) and cannot be deleted; deactivate it instead"
        ))
    };
    if responses > 0 {
        return Err(conflict());
    }
    if exec(conn, db::forms::delete_if_unanswered(form_id), "delete form")? == 0 {
        return Err(conflict());
    }
    tracing::info!(%form_id, "form deleted");
    Ok(())
}

pub fn get_public(conn: &Connection, share_token: &str) -> Result<PublicForm, ServiceError> {
    let form = load_public(conn, share_token)?;
    Ok(PublicForm {
        workspace_name: workspaces::name_of(conn, &form.workspace_id)?,
        title: form.title,
        description: form.description,
        fields: form.schema.into_fields(),
        allow_multiple_submissions: form.allow_multiple_submissions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{Fixture, fixture, user};
    use tinta_api::{CreateTemplateRequest, CreateWorkspaceRequest, db::responses};

    fn setup() -> (Fixture, AuthUser, String) {
        let fx = fixture();
        let ada = user(&fx, "u1", "ada@example.com");
        let ws = {
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
        (fx, ada, ws)
    }

    fn contact_form(fx: &Fixture, ws: &str, ada: &AuthUser) -> FormInfo {
        let conn = fx.db.conn();
        create(
            &conn,
            &fx.config,
            ws,
            ada,
            CreateFormRequest {
                title: Some("Contact".into()),
                fields: Some(tinta_core::testing::contact_schema().into_fields()),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_create_from_template_snapshots_fields() {
        let (fx, ada, ws) = setup();
        let conn = fx.db.conn();
        let template = templates::create(
            &conn,
            &ada,
            CreateTemplateRequest {
                name: "Survey".into(),
                description: None,
                fields: tinta_core::testing::survey_schema().into_fields(),
            },
        )
        .unwrap();

        let form = create(
            &conn,
            &fx.config,
            &ws,
            &ada,
            CreateFormRequest {
                template_id: Some(template.id.clone()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(form.title, "Survey");
        assert_eq!(form.fields.len(), 6);
        assert_eq!(form.template_id.as_deref(), Some(template.id.as_str()));
        assert!(form.is_active);
        assert!(form.allow_multiple_submissions);
        assert_eq!(form.share_url, format!("http://localhost:3000/f/{}", form.share_token));

        // Deleting the template leaves the form's copy intact.
        templates::delete(&conn, &template.id, &ada).unwrap();
        let reloaded = get(&conn, &fx.config, &form.id, &ada).unwrap();
        assert_eq!(reloaded.template_id, None);
        assert_eq!(reloaded.fields.len(), 6);
    }

    #[test]
    fn test_title_required_without_template() {
        let (fx, ada, ws) = setup();
        let conn = fx.db.conn();
        let err = create(&conn, &fx.config, &ws, &ada, CreateFormRequest::default()).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_update_and_field_ordering() {
        let (fx, ada, ws) = setup();
        let form = contact_form(&fx, &ws, &ada);
        let conn = fx.db.conn();

        let moved = move_field(&conn, &fx.config, &form.id, &ada, 4, 0).unwrap();
        assert_eq!(moved.fields[0].id, "resume");
        assert_eq!(
            move_field(&conn, &fx.config, &form.id, &ada, 9, 0)
                .unwrap_err()
                .status_code(),
            400
        );

        let order: Vec<String> = ["name", "email", "topic", "message", "resume"]
            .map(String::from)
            .to_vec();
        let reordered = reorder_fields(&conn, &fx.config, &form.id, &ada, &order).unwrap();
        assert_eq!(reordered.fields[4].id, "resume");

        let updated = update(
            &conn,
            &fx.config,
            &form.id,
            &ada,
            UpdateFormRequest {
                title: Some("Get in touch".into()),
                is_active: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.title, "Get in touch");
        assert!(!updated.is_active);
        assert!(updated.notify_on_submission);
        assert_eq!(updated.fields.len(), 5);
    }

    #[test]
    fn test_public_states() {
        let (fx, ada, ws) = setup();
        let form = contact_form(&fx, &ws, &ada);
        let conn = fx.db.conn();

        let public = get_public(&conn, &form.share_token).unwrap();
        assert_eq!(public.workspace_name, "Acme");
        assert_eq!(get_public(&conn, "unknown").unwrap_err().status_code(), 404);

        let rotated = regenerate_share_token(&conn, &fx.config, &form.id, &ada).unwrap();
        assert_ne!(rotated.share_token, form.share_token);
        assert_eq!(
            get_public(&conn, &form.share_token).unwrap_err().status_code(),
            404
        );

        update(
            &conn,
            &fx.config,
            &form.id,
            &ada,
            UpdateFormRequest {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(
            get_public(&conn, &rotated.share_token).unwrap_err().status_code(),
            410
        );
    }

    #[test]
    fn test_delete_rules() {
        let (fx, ada, ws) = setup();
        let bob = user(&fx, "u2", "bob@example.com");
        let form = contact_form(&fx, &ws, &ada);
        let empty = contact_form(&fx, &ws, &ada);
        let conn = fx.db.conn();
        exec(&conn, db::workspaces::insert_member(&ws, "u2", "member"), "add").unwrap();

        exec(
            &conn,
            responses::insert(&responses::InsertParams {
                id: "r1",
                form_id: &form.id,
                data: "{}",
                respondent_email: None,
                respondent_key: None,
                metadata: "{}",
                created_at: "2025-01-01 00:00:00",
            }),
            "insert response",
        )
        .unwrap();

        assert_eq!(delete(&conn, &empty.id, &bob).unwrap_err().status_code(), 403);
        assert_eq!(delete(&conn, &form.id, &ada).unwrap_err().status_code(), 409);

        let listed = list_for_workspace(&conn, &fx.config, &ws, &bob).unwrap();
        let answered = listed.iter().find(|f| f.form.id == form.id).unwrap();
        assert_eq!(answered.response_count, 1);
        assert_eq!(answered.new_response_count, 1);

        delete(&conn, &empty.id, &ada).unwrap();
        assert_eq!(
            get(&conn, &fx.config, &empty.id, &ada).unwrap_err().status_code(),
            404
        );
    }
}
