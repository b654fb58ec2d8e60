use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};

use tinta_api::{
    OkResponse, ResponseDetail, ResponseListQuery, ResponseListResponse, ServiceError,
    UpdateResponseStatusRequest,
};
use tinta_core::blob::BlobError;

use crate::auth::AuthUser;
use crate::config::AppConfig;
use crate::error::ApiErr;
use crate::export::{self, ExportError, PdfRenderer};
use crate::services::responses::{self, discard_blobs};
use crate::storage::Db;

// ---------------------------------------------------------------------------
// Review
// ---------------------------------------------------------------------------

/// GET /api/forms/:id/responses — paged, optionally filtered by status.
pub async fn list_responses(
    State(db): State<Db>,
    user: AuthUser,
    Path(form_id): Path<String>,
    Query(q): Query<ResponseListQuery>,
) -> Result<Json<ResponseListResponse>, ApiErr> {
    let conn = db.conn();
    Ok(Json(responses::list(&conn, &form_id, &user, &q)?))
}

/// GET /api/responses/:id — full response with attachments.
pub async fn get_response(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ResponseDetail>, ApiErr> {
    let conn = db.conn();
    Ok(Json(responses::get(&conn, &config, &id, &user)?))
}

/// PUT /api/responses/:id/status
pub async fn update_status(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateResponseStatusRequest>,
) -> Result<Json<ResponseDetail>, ApiErr> {
    let conn = db.conn();
    Ok(Json(responses::update_status(
        &conn, &config, &id, &user, req.status,
    )?))
}

/// DELETE /api/responses/:id — admin only; attachments are removed too.
pub async fn delete_response(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    let conn = db.conn();
    let keys = responses::delete(&conn, &id, &user)?;
    discard_blobs(db.blobs(), keys.iter().map(String::as_str));
    Ok(Json(OkResponse::ok()))
}

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && !matches!(c, '"' | '\\')) {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{ascii}\"; filename*=UTF-8''{}",
        urlencoding::encode(file_name)
    )
}

/// GET /api/responses/:id/files/:file_id — stream an attachment to members.
pub async fn download_file(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
    Path((id, file_id)): Path<(String, String)>,
) -> Result<Response, ApiErr> {
    let conn = db.conn();
    let file = responses::file(&conn, &config, &id, &file_id, &user)?;
    let bytes = db.blobs().get(&file.storage_key).map_err(|e| match e {
        BlobError::NotFound(_) => ApiErr::not_found("file not found"),
        other => {
            tracing::error!("read attachment {}: {other}", file.storage_key);
            ApiErr::internal("failed to read file")
        }
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, file.content_type),
            (header::CONTENT_DISPOSITION, content_disposition(&file.file_name)),
        ],
        bytes,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

fn export_document(
    db: &Db,
    config: &AppConfig,
    id: &str,
    user: &AuthUser,
) -> Result<String, ApiErr> {
    let conn = db.conn();
    let (fields, detail) = responses::export_source(&conn, config, id, user)?;
    Ok(export::render_response_html(&fields, &detail))
}

/// GET /api/responses/:id/export.html — printable HTML.
pub async fn export_html(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Html<String>, ApiErr> {
    Ok(Html(export_document(&db, &config, &id, &user)?))
}

/// GET /api/responses/:id/export.pdf — HTML rendered through the PDF service.
pub async fn export_pdf(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    State(pdf): State<Option<PdfRenderer>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Response, ApiErr> {
    let Some(pdf) = pdf else {
        return Err(ServiceError::Unavailable("PDF export is not configured".into()).into());
    };
    let html = export_document(&db, &config, &id, &user)?;

    let bytes = pdf.render(&html).await.map_err(|e| {
        tracing::error!(response_id = %id, "PDF export: {e}");
        match e {
            ExportError::Transport(_) => ApiErr::from(ServiceError::Unavailable(
                "PDF renderer is unreachable".into(),
            )),
            ExportError::Status(_) => ApiErr::bad_gateway("PDF renderer failed"),
        }
    })?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"response-{id}.pdf\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_keeps_utf8_name() {
        assert_eq!(
            content_disposition("cv final.pdf"),
            "attachment; filename=\"cv final.pdf\"; filename*=UTF-8''cv%20final.pdf"
        );
        let header = content_disposition("résumé\".pdf");
        assert!(header.starts_with("attachment; filename=\"r_sum__.pdf\";"));
        assert!(header.ends_with("filename*=UTF-8''r%C3%A9sum%C3%A9%22.pdf"));
    }
}
