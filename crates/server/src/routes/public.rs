use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{ConnectInfo, Multipart, Path, State},
    http::{HeaderMap, StatusCode},
};

use tinta_api::{PublicForm, SubmissionReceipt};

use super::{client_ip, user_agent};
use crate::config::AppConfig;
use crate::error::ApiErr;
use crate::mail::{self, Mailer};
use crate::services::forms;
use crate::services::responses::{self, Submission, SubmissionNotice, UploadedFile};
use crate::storage::Db;

/// GET /api/public/forms/:token — form definition for respondents.
pub async fn get_public_form(
    State(db): State<Db>,
    Path(token): Path<String>,
) -> Result<Json<PublicForm>, ApiErr> {
    let conn = db.conn();
    Ok(Json(forms::get_public(&conn, &token)?))
}

/// Parts: `data` (JSON answers keyed by field id), optional
/// `respondent_email`, and one file part per file field named by its id.
async fn read_submission(mut multipart: Multipart) -> Result<Submission, ApiErr> {
    let mut submission = Submission::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(file_name) = field.file_name().map(str::to_string) {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field.bytes().await?.to_vec();
            // Browsers send an empty part for an untouched file input.
            if file_name.is_empty() && bytes.is_empty() {
                continue;
            }
            submission.files.push(UploadedFile {
                field_id: name,
                file_name,
                content_type,
                bytes,
            });
            continue;
        }
        match name.as_str() {
            "data" => {
                let raw = field.text().await?;
                submission.data = serde_json::from_str(&raw)
                    .map_err(|e| ApiErr::bad_request(format!("invalid data: {e}")))?;
            }
            "respondent_email" => {
                submission.respondent_email = Some(field.text().await?);
            }
            other => tracing::debug!("ignoring multipart part {other:?}"),
        }
    }
    Ok(submission)
}

async fn notify(mailer: &dyn Mailer, config: &AppConfig, notice: SubmissionNotice) {
    let url = config.response_url(&notice.response_id);
    for to in &notice.recipients {
        let email = mail::submission_email(to, &notice.form_title, &notice.answers, &url);
        if let Err(e) = mailer.send(&email).await {
            tracing::warn!(response_id = %notice.response_id, "submission notice to {to}: {e}");
        }
    }
}

/// POST /api/public/forms/:token/responses — multipart submission.
pub async fn submit_response(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    State(mailer): State<Arc<dyn Mailer>>,
    Path(token): Path<String>,
    headers: HeaderMap,
    peer: Option<Extension<ConnectInfo<SocketAddr>>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SubmissionReceipt>), ApiErr> {
    let mut submission = read_submission(multipart).await?;
    submission.client_ip = client_ip(&headers)
        .or_else(|| peer.map(|Extension(ConnectInfo(addr))| addr.ip().to_string()));
    submission.user_agent = user_agent(&headers);

    let submitted = {
        let conn = db.conn();
        responses::submit(&conn, &config, db.blobs(), &token, submission)?
    };

    if let Some(notice) = submitted.notice {
        notify(mailer.as_ref(), &config, notice).await;
    }

    Ok((StatusCode::CREATED, Json(submitted.receipt)))
}
