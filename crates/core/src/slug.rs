//! Workspace slugs: URL-safe, globally unique, fixed at creation time.

use thiserror::Error;

pub const MIN_SLUG_LEN: usize = 3;
pub const MAX_SLUG_LEN: usize = 48;

/// Slugs that would shadow application routes.
pub const RESERVED_SLUGS: &[&str] = &[
    "admin", "api", "app", "f", "invite", "login", "new", "settings", "templates",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug must be {MIN_SLUG_LEN}-{MAX_SLUG_LEN} characters")]
    Length,
    #[error("slug may only contain lowercase letters, digits and single dashes")]
    Charset,
    #[error("slug {0:?} is reserved")]
    Reserved(String),
}

/// Derive a slug candidate from a display name.
///
/// Non-alphanumeric runs collapse into one dash; the result may still fail
/// [`validate_slug`] (e.g. a name made only of punctuation).
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }
    slug.truncate(MAX_SLUG_LEN);
    slug.trim_end_matches('-').to_string()
}

/// Make a derived slug usable by appending `suffix`; an empty base becomes
/// `workspace-{suffix}`.
pub fn with_suffix(base: &str, suffix: &str) -> String {
    let base = if base.is_empty() { "workspace" } else { base };
    let keep = MAX_SLUG_LEN.saturating_sub(suffix.len() + 1);
    let base: String = base.chars().take(keep).collect();
    format!("{}-{suffix}", base.trim_end_matches('-'))
}

pub fn validate_slug(slug: &str) -> Result<(), SlugError> {
    if slug.len() < MIN_SLUG_LEN || slug.len() > MAX_SLUG_LEN {
        return Err(SlugError::Length);
    }
    let charset_ok = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !charset_ok || slug.starts_with('-') || slug.ends_with('-') || slug.contains("--") {
        return Err(SlugError::Charset);
    }
    if RESERVED_SLUGS.contains(&slug) {
        return Err(SlugError::Reserved(slug.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Tinta Agency"), "tinta-agency");
        assert_eq!(slugify("  Acme, Inc. -- Design!! "), "acme-inc-design");
        assert_eq!(slugify("Café Été"), "caf-t");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify(&"ab ".repeat(40)).len(), MAX_SLUG_LEN - 1);
    }

    #[test]
    fn test_with_suffix_makes_short_names_valid() {
        assert_eq!(with_suffix("ab", "x1y2z3"), "ab-x1y2z3");
        assert_eq!(with_suffix("", "x1y2z3"), "workspace-x1y2z3");
        assert_eq!(with_suffix("api", "x1y2z3"), "api-x1y2z3");
        for slug in ["ab-x1y2z3", "workspace-x1y2z3", "api-x1y2z3"] {
            assert_eq!(validate_slug(slug), Ok(()));
        }
    }

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("tinta-agency").is_ok());
        assert!(validate_slug("a1b").is_ok());
        assert_eq!(validate_slug("ab"), Err(SlugError::Length));
        assert_eq!(validate_slug(&"a".repeat(49)), Err(SlugError::Length));
        assert_eq!(validate_slug("Tinta"), Err(SlugError::Charset));
        assert_eq!(validate_slug("-abc"), Err(SlugError::Charset));
        assert_eq!(validate_slug("abc-"), Err(SlugError::Charset));
        assert_eq!(validate_slug("a--b"), Err(SlugError::Charset));
        assert_eq!(validate_slug("admin"), Err(SlugError::Reserved("admin".into())));
    }
}
