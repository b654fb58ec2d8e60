//! Blob storage for avatars, workspace images and form attachments.

use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("invalid blob key: {0}")]
    InvalidKey(String),
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Minimal get/put/delete store keyed by slash-separated paths.
pub trait BlobStore: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), BlobError>;
    fn get(&self, key: &str) -> Result<Vec<u8>, BlobError>;
    /// Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), BlobError>;
}

/// Filesystem-backed store rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, BlobError> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |p, seg| p.join(seg)))
    }
}

impl BlobStore for LocalBlobStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), BlobError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.path_for(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keys are relative, slash-separated, and limited to `[A-Za-z0-9._-]`
/// segments that are neither empty nor dot-only.
pub fn validate_key(key: &str) -> Result<(), BlobError> {
    let ok = !key.is_empty()
        && key.len() <= 512
        && key.split('/').all(|seg| {
            !seg.is_empty()
                && !seg.chars().all(|c| c == '.')
                && seg
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        });
    if ok {
        Ok(())
    } else {
        Err(BlobError::InvalidKey(key.to_string()))
    }
}

pub fn avatar_key(user_id: &str, ext: &str) -> String {
    format!("avatars/{user_id}/{}.{ext}", uuid::Uuid::new_v4().simple())
}

pub fn workspace_image_key(workspace_id: &str, ext: &str) -> String {
    format!("workspaces/{workspace_id}/{}.{ext}", uuid::Uuid::new_v4().simple())
}

/// `file_name` must already be sanitised.
pub fn attachment_key(form_id: &str, response_id: &str, file_name: &str) -> String {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!("attachments/{form_id}/{response_id}/{}-{file_name}", &nonce[..8])
}

/// Public keys may be served without authentication; attachments never are.
pub fn is_public_key(key: &str) -> bool {
    key.starts_with("avatars/") || key.starts_with("workspaces/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        let key = avatar_key("user-1", "png");
        store.put(&key, b"\x89PNG").unwrap();
        assert_eq!(store.get(&key).unwrap(), b"\x89PNG");

        store.delete(&key).unwrap();
        assert!(matches!(store.get(&key), Err(BlobError::NotFound(_))));
        // idempotent
        store.delete(&key).unwrap();
    }

    #[test]
    fn test_rejects_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        for bad in ["../x", "a//b", "/abs", "a/../b", "a b", "", "a/."] {
            assert!(
                matches!(store.put(bad, b"x"), Err(BlobError::InvalidKey(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_key_layout() {
        let key = attachment_key("form1", "resp1", "cv.pdf");
        assert!(key.starts_with("attachments/form1/resp1/"));
        assert!(key.ends_with("-cv.pdf"));
        validate_key(&key).unwrap();

        assert!(is_public_key(&workspace_image_key("ws1", "webp")));
        assert!(!is_public_key(&key));
    }
}
