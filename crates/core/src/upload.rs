//! Upload policy: what may be stored, how large, and under which key.

use thiserror::Error;

const MB: usize = 1024 * 1024;

const IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

const ATTACHMENT_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
    "application/pdf",
    "text/plain",
    "text/csv",
    "application/zip",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Avatar,
    WorkspaceImage,
    FormAttachment,
}

impl UploadKind {
    pub fn max_bytes(&self) -> usize {
        match self {
            Self::Avatar => 5 * MB,
            Self::WorkspaceImage => 2 * MB,
            Self::FormAttachment => 10 * MB,
        }
    }

    pub fn allowed_types(&self) -> &'static [&'static str] {
        match self {
            Self::Avatar | Self::WorkspaceImage => IMAGE_TYPES,
            Self::FormAttachment => ATTACHMENT_TYPES,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::WorkspaceImage => "workspace image",
            Self::FormAttachment => "attachment",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("{kind} is empty")]
    Empty { kind: &'static str },
    #[error("{kind} exceeds the {max_mb}MB limit")]
    TooLarge { kind: &'static str, max_mb: usize },
    #[error("{kind} type {content_type:?} is not allowed")]
    UnsupportedType {
        kind: &'static str,
        content_type: String,
    },
}

/// Strip parameters (`; charset=...`) and lowercase a content type.
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Check an upload against the MIME allow-list and size ceiling for `kind`.
/// Returns the normalised content type.
pub fn check(kind: UploadKind, content_type: &str, len: usize) -> Result<String, UploadError> {
    if len == 0 {
        return Err(UploadError::Empty { kind: kind.label() });
    }
    if len > kind.max_bytes() {
        return Err(UploadError::TooLarge {
            kind: kind.label(),
            max_mb: kind.max_bytes() / MB,
        });
    }
    let content_type = normalize_content_type(content_type);
    if !kind.allowed_types().contains(&content_type.as_str()) {
        return Err(UploadError::UnsupportedType {
            kind: kind.label(),
            content_type,
        });
    }
    Ok(content_type)
}

/// File extension used in blob keys for a normalised content type.
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        "text/csv" => "csv",
        "application/zip" => "zip",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        _ => "bin",
    }
}

fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or_default()
}

/// Reduce a client-supplied file name to ASCII that is safe inside a blob key.
pub fn sanitize_file_name(name: &str) -> String {
    let base = base_name(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    let cleaned: String = cleaned.chars().take(120).collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Name shown to reviewers and sent in `Content-Disposition`: the client's
/// name without directories or control characters, any script kept.
pub fn display_file_name(name: &str) -> String {
    let cleaned: String = base_name(name)
        .chars()
        .filter(|c| !c.is_control())
        .take(200)
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_ceilings() {
        assert_eq!(UploadKind::Avatar.max_bytes(), 5 * MB);
        assert_eq!(UploadKind::WorkspaceImage.max_bytes(), 2 * MB);
        assert_eq!(UploadKind::FormAttachment.max_bytes(), 10 * MB);

        assert!(check(UploadKind::WorkspaceImage, "image/png", 2 * MB).is_ok());
        assert_eq!(
            check(UploadKind::WorkspaceImage, "image/png", 2 * MB + 1),
            Err(UploadError::TooLarge {
                kind: "workspace image",
                max_mb: 2
            })
        );
        assert!(check(UploadKind::Avatar, "image/png", 4 * MB).is_ok());
        assert!(check(UploadKind::FormAttachment, "application/pdf", 10 * MB + 1).is_err());
    }

    #[test]
    fn test_mime_allow_lists() {
        assert_eq!(
            check(UploadKind::Avatar, "IMAGE/JPEG; charset=binary", 10).unwrap(),
            "image/jpeg"
        );
        assert!(matches!(
            check(UploadKind::Avatar, "application/pdf", 10),
            Err(UploadError::UnsupportedType { .. })
        ));
        assert!(check(UploadKind::FormAttachment, "application/pdf", 10).is_ok());
        assert!(check(UploadKind::FormAttachment, "application/x-msdownload", 10).is_err());
        assert_eq!(
            check(UploadKind::FormAttachment, "text/plain", 0),
            Err(UploadError::Empty { kind: "attachment" })
        );
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report.pdf"), "report.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\CV final.docx"), "CV_final.docx");
        assert_eq!(sanitize_file_name(".env"), "env");
        assert_eq!(sanitize_file_name(""), "file");
    }

    #[test]
    fn test_display_file_name_keeps_unicode() {
        assert_eq!(display_file_name("../Lebenslauf Müller.pdf"), "Lebenslauf Müller.pdf");
        assert_eq!(display_file_name("C:\\docs\\履歴書.docx"), "履歴書.docx");
        assert_eq!(display_file_name("a\r\nb.txt"), "ab.txt");
        assert_eq!(display_file_name(" / "), "file");
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("application/octet-stream"), "bin");
    }
}
