use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use tinta_core::blob::{self, BlobError};

use crate::error::ApiErr;
use crate::storage::Db;

fn content_type_for(key: &str) -> &'static str {
    match key.rsplit('.').next().unwrap_or_default() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// GET /api/blobs/*key — avatars and workspace images. Attachments are only
/// reachable through the authenticated download route.
pub async fn get_blob(State(db): State<Db>, Path(key): Path<String>) -> Result<Response, ApiErr> {
    if !blob::is_public_key(&key) {
        return Err(ApiErr::not_found("not found"));
    }
    let bytes = match db.blobs().get(&key) {
        Ok(bytes) => bytes,
        Err(BlobError::NotFound(_) | BlobError::InvalidKey(_)) => {
            return Err(ApiErr::not_found("not found"));
        }
        Err(e) => return Err(ApiErr::from_db("read blob")(e)),
    };

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&key)),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        bytes,
    )
        .into_response())
}
