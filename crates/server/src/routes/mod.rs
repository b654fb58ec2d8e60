pub mod auth;
pub mod blobs;
pub mod forms;
pub mod health;
pub mod invitations;
pub mod members;
pub mod public;
pub mod responses;
pub mod templates;
pub mod users;
pub mod workspaces;

use axum::extract::Multipart;
use axum::http::HeaderMap;

use crate::error::ApiErr;

/// One file part of a multipart body.
#[derive(Debug)]
pub(crate) struct FilePart {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Read the first part that carries a file name (image uploads).
pub(crate) async fn read_single_file(mut multipart: Multipart) -> Result<FilePart, ApiErr> {
    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_none() {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await?.to_vec();
        return Ok(FilePart {
            content_type,
            bytes,
        });
    }
    Err(ApiErr::bad_request("expected a file upload"))
}

/// Best-effort client address from proxy headers.
pub(crate) fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

pub(crate) fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
