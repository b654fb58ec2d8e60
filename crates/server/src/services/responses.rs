//! Public submissions and the response review lifecycle.

use std::collections::HashSet;

use rusqlite::{Connection, Row};
use serde_json::{Value, json};

use tinta_api::{
    FieldDescriptor, FieldKind, ResponseDetail, ResponseFileInfo, ResponseListQuery,
    ResponseListResponse, ResponseStatus, ResponseSummary, ServiceError, SubmissionReceipt,
    crypto, db, service,
};
use tinta_core::blob::{self, BlobStore};
use tinta_core::upload::{self, UploadKind};
use tinta_core::validate_submission;

use super::{forms, json_column, now_sql, require_admin, require_member, workspaces};
use crate::auth::AuthUser;
use crate::config::AppConfig;
use crate::export;
use crate::storage::{exec, query_all, query_one, query_opt};

// ─── Submission ─────────────────────────────────────────────────────────────

/// One uploaded file, keyed by the form field it answers.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field_id: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct Submission {
    pub data: Value,
    pub files: Vec<UploadedFile>,
    /// Explicit respondent address; otherwise the first email field answer.
    pub respondent_email: Option<String>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Who to tell about a new response, and what to tell them.
#[derive(Debug)]
pub struct SubmissionNotice {
    pub recipients: Vec<String>,
    pub form_title: String,
    pub answers: Vec<(String, String)>,
    pub response_id: String,
}

#[derive(Debug)]
pub struct Submitted {
    pub receipt: SubmissionReceipt,
    pub notice: Option<SubmissionNotice>,
}

struct CheckedFile<'a> {
    upload: &'a UploadedFile,
    content_type: String,
    file_name: String,
    key_name: String,
}

fn respondent_email(
    explicit: Option<&str>,
    fields: &[FieldDescriptor],
    answers: &serde_json::Map<String, Value>,
) -> Result<Option<String>, ServiceError> {
    if let Some(email) = explicit.map(str::trim).filter(|e| !e.is_empty()) {
        return service::validate_email(email).map(Some);
    }
    Ok(fields
        .iter()
        .filter(|f| f.kind == FieldKind::Email)
        .find_map(|f| answers.get(&f.id).and_then(Value::as_str))
        .map(str::to_lowercase))
}

/// Prefix upload policy errors with the field they came from.
fn attachment_error(field_id: &str, e: upload::UploadError) -> ServiceError {
    match ServiceError::from(e) {
        ServiceError::PayloadTooLarge(m) => {
            ServiceError::PayloadTooLarge(format!("{field_id}: {m}"))
        }
        ServiceError::BadRequest(m) => ServiceError::BadRequest(format!("{field_id}: {m}")),
        other => other,
    }
}

/// Normalised respondent email, else a hash of the client address.
fn respondent_key(email: Option<&str>, client_ip: Option<&str>) -> Option<String> {
    email
        .map(str::to_string)
        .or_else(|| client_ip.map(|ip| crypto::hash_token(ip.trim())))
}

/// Validate and store a public submission. Blobs are written first and
/// removed again if the database insert fails.
pub fn submit(
    conn: &Connection,
    config: &AppConfig,
    blobs: &dyn BlobStore,
    share_token: &str,
    submission: Submission,
) -> Result<Submitted, ServiceError> {
    let form = forms::load_public(conn, share_token)?;

    let attached: HashSet<String> = submission.files.iter().map(|f| f.field_id.clone()).collect();
    let data = if submission.data.is_null() {
        json!({})
    } else {
        submission.data
    };
    let answers = validate_submission(&form.schema, &data, &attached)?;

    let files = submission
        .files
        .iter()
        .map(|upload| {
            let content_type =
                upload::check(UploadKind::FormAttachment, &upload.content_type, upload.bytes.len())
                    .map_err(|e| attachment_error(&upload.field_id, e))?;
            Ok(CheckedFile {
                upload,
                content_type,
                file_name: upload::display_file_name(&upload.file_name),
                key_name: upload::sanitize_file_name(&upload.file_name),
            })
        })
        .collect::<Result<Vec<_>, ServiceError>>()?;

    let email = respondent_email(
        submission.respondent_email.as_deref(),
        form.schema.fields(),
        &answers,
    )?;
    let key = respondent_key(email.as_deref(), submission.client_ip.as_deref());
    if !form.allow_multiple_submissions {
        let Some(key) = key.as_deref() else {
            return Err(ServiceError::BadRequest(
                "this form accepts one response per person; provide an email address".into(),
            ));
        };
        let seen = query_one(
            conn,
            db::responses::respondent_exists(&form.id, key),
            "check previous submission",
            |r| r.get::<_, bool>(0),
        )?;
        if seen {
            return Err(ServiceError::Conflict(
                "you have already submitted this form".into(),
            ));
        }
    }

    let response_id = uuid::Uuid::new_v4().to_string();
    let submitted_at = now_sql()?;
    let metadata = json!({
        "user_agent": submission.user_agent,
        "file_count": files.len(),
    });

    let mut stored: Vec<(String, &CheckedFile<'_>)> = Vec::with_capacity(files.len());
    for file in &files {
        let key = blob::attachment_key(&form.id, &response_id, &file.key_name);
        if let Err(e) = blobs.put(&key, &file.upload.bytes) {
            discard_blobs(blobs, stored.iter().map(|(k, _)| k.as_str()));
            return Err(e.into());
        }
        stored.push((key, file));
    }

    let inserted = (|| {
        let tx = conn
            .unchecked_transaction()
            .map_err(ServiceError::from_db("begin submission"))?;
        exec(
            &tx,
            db::responses::insert(&db::responses::InsertParams {
                id: &response_id,
                form_id: &form.id,
                data: &Value::Object(answers.clone()).to_string(),
                respondent_email: email.as_deref(),
                respondent_key: key.as_deref(),
                metadata: &metadata.to_string(),
                created_at: &submitted_at,
            }),
            "store response",
        )?;
        for (storage_key, file) in &stored {
            exec(
                &tx,
                db::responses::insert_file(&db::responses::FileInsertParams {
                    id: &uuid::Uuid::new_v4().to_string(),
                    response_id: &response_id,
                    field_id: &file.upload.field_id,
                    file_name: &file.file_name,
                    content_type: &file.content_type,
                    size_bytes: file.upload.bytes.len() as i64,
                    storage_key,
                }),
                "store attachment",
            )?;
        }
        tx.commit().map_err(ServiceError::from_db("commit submission"))
    })();
    if let Err(e) = inserted {
        discard_blobs(blobs, stored.iter().map(|(k, _)| k.as_str()));
        return Err(e);
    }

    tracing::info!(
        form_id = %form.id,
        %response_id,
        files = stored.len(),
        "response submitted"
    );

    let notice = if form.notify_on_submission {
        let recipients = workspaces::admin_emails(conn, &form.workspace_id)?;
        let detail = load_detail(conn, config, &response_id)?;
        Some(SubmissionNotice {
            recipients,
            answers: export::answer_rows(form.schema.fields(), &detail),
            form_title: form.title.clone(),
            response_id: response_id.clone(),
        })
    } else {
        None
    };

    Ok(Submitted {
        receipt: SubmissionReceipt {
            success: true,
            response_id,
            submitted_at,
        },
        notice,
    })
}

/// Best-effort removal; failures only leave orphaned files behind.
pub(crate) fn discard_blobs<'a>(blobs: &dyn BlobStore, keys: impl Iterator<Item = &'a str>) {
    for key in keys {
        if let Err(e) = blobs.delete(key) {
            tracing::warn!("failed to remove blob {key}: {e}");
        }
    }
}

// ─── Review ─────────────────────────────────────────────────────────────────

fn parse_status(raw: &str) -> ResponseStatus {
    ResponseStatus::parse(raw).unwrap_or_default()
}

fn file_from_row(
    row: &Row<'_>,
    config: &AppConfig,
    response_id: &str,
) -> rusqlite::Result<ResponseFileInfo> {
    let id: String = row.get(0)?;
    Ok(ResponseFileInfo {
        download_url: config.response_file_url(response_id, &id),
        id,
        field_id: row.get(1)?,
        file_name: row.get(2)?,
        content_type: row.get(3)?,
        size_bytes: row.get(4)?,
    })
}

fn load_detail(
    conn: &Connection,
    config: &AppConfig,
    response_id: &str,
) -> Result<ResponseDetail, ServiceError> {
    let mut detail = query_opt(
        conn,
        db::responses::get_by_id(response_id),
        "load response",
        |row| {
            Ok(ResponseDetail {
                id: row.get(0)?,
                form_id: row.get(1)?,
                form_title: row.get(2)?,
                workspace_id: row.get(3)?,
                status: parse_status(&row.get::<_, String>(4)?),
                respondent_email: row.get(5)?,
                data: json_column(&row.get::<_, String>(6)?),
                metadata: json_column(&row.get::<_, String>(7)?),
                files: Vec::new(),
                created_at: row.get(8)?,
                updated_at: row.get(9)?,
            })
        },
    )?
    .ok_or_else(|| ServiceError::NotFound("response not found".into()))?;
    detail.files = query_all(
        conn,
        db::responses::list_files(response_id),
        "list attachments",
        |row| file_from_row(row, config, response_id),
    )?;
    Ok(detail)
}

fn load_for_member(
    conn: &Connection,
    config: &AppConfig,
    response_id: &str,
    user: &AuthUser,
) -> Result<ResponseDetail, ServiceError> {
    let detail = load_detail(conn, config, response_id)?;
    require_member(conn, &detail.workspace_id, user)?;
    Ok(detail)
}

pub fn list(
    conn: &Connection,
    form_id: &str,
    user: &AuthUser,
    query: &ResponseListQuery,
) -> Result<ResponseListResponse, ServiceError> {
    forms::load_for_member(conn, form_id, user)?;
    let status = query.status.map(|s| s.as_str());
    let (limit, offset) = query.limit_offset();

    let responses = query_all(
        conn,
        db::responses::list(form_id, status, limit, offset),
        "list responses",
        |row| {
            Ok(ResponseSummary {
                id: row.get(0)?,
                form_id: row.get(1)?,
                status: parse_status(&row.get::<_, String>(2)?),
                respondent_email: row.get(3)?,
                data: json_column(&row.get::<_, String>(4)?),
                created_at: row.get(5)?,
                updated_at: row.get(6)?,
                file_count: row.get(7)?,
            })
        },
    )?;
    let total = query_one(
        conn,
        db::responses::count(form_id, status),
        "count responses",
        |r| r.get(0),
    )?;
    Ok(ResponseListResponse {
        responses,
        total,
        page: offset / limit + 1,
        per_page: limit,
    })
}

pub fn get(
    conn: &Connection,
    config: &AppConfig,
    response_id: &str,
    user: &AuthUser,
) -> Result<ResponseDetail, ServiceError> {
    load_for_member(conn, config, response_id, user)
}

pub fn update_status(
    conn: &Connection,
    config: &AppConfig,
    response_id: &str,
    user: &AuthUser,
    status: ResponseStatus,
) -> Result<ResponseDetail, ServiceError> {
    load_for_member(conn, config, response_id, user)?;
    exec(
        conn,
        db::responses::update_status(response_id, status.as_str()),
        "update response status",
    )?;
    load_detail(conn, config, response_id)
}

/// Returns the attachment keys the caller should remove from blob storage.
pub fn delete(
    conn: &Connection,
    response_id: &str,
    user: &AuthUser,
) -> Result<Vec<String>, ServiceError> {
    let workspace_id = query_opt(
        conn,
        db::responses::get_by_id(response_id),
        "load response",
        |row| row.get::<_, String>(3),
    )?
    .ok_or_else(|| ServiceError::NotFound("response not found".into()))?;
    require_admin(conn, &workspace_id, user)?;

    let keys = query_all(
        conn,
        db::responses::list_files(response_id),
        "list attachments",
        |row| row.get::<_, String>(5),
    )?;
    exec(conn, db::responses::delete(response_id), "delete response")?;
    tracing::info!(%response_id, files = keys.len(), "response deleted");
    Ok(keys)
}

/// An attachment as needed by the download proxy.
#[derive(Debug)]
pub struct StoredFile {
    pub file_name: String,
    pub content_type: String,
    pub storage_key: String,
}

pub fn file(
    conn: &Connection,
    config: &AppConfig,
    response_id: &str,
    file_id: &str,
    user: &AuthUser,
) -> Result<StoredFile, ServiceError> {
    load_for_member(conn, config, response_id, user)?;
    query_opt(
        conn,
        db::responses::get_file(response_id, file_id),
        "load attachment",
        |row| {
            Ok(StoredFile {
                file_name: row.get(2)?,
                content_type: row.get(3)?,
                storage_key: row.get(5)?,
            })
        },
    )?
    .ok_or_else(|| ServiceError::NotFound("file not found".into()))
}

/// The response plus the form's current fields, for export.
pub fn export_source(
    conn: &Connection,
    config: &AppConfig,
    response_id: &str,
    user: &AuthUser,
) -> Result<(Vec<FieldDescriptor>, ResponseDetail), ServiceError> {
    let detail = load_for_member(conn, config, response_id, user)?;
    let form = forms::load(conn, &detail.form_id)?;
    Ok((form.schema.into_fields(), detail))
}
