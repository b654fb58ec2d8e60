//! Workspaces, membership, and the role checks every other service uses.

use rusqlite::{Connection, Row};

use tinta_api::{
    CreateWorkspaceRequest, ImageUploadResponse, MemberResponse, ServiceError,
    SlugAvailabilityResponse, UpdateWorkspaceRequest, WorkspaceDetailResponse, WorkspaceResponse,
    WorkspaceRole, db, service,
};
use tinta_core::blob::{self, BlobStore};
use tinta_core::slug;
use tinta_core::upload::{self, UploadKind};

use crate::auth::AuthUser;
use crate::config::AppConfig;
use crate::storage::{exec, execute, is_constraint_violation, query_all, query_one, query_opt};

// ─── Authorization ──────────────────────────────────────────────────────────

pub fn role_of(
    conn: &Connection,
    workspace_id: &str,
    user_id: &str,
) -> Result<Option<WorkspaceRole>, ServiceError> {
    let role = query_opt(
        conn,
        db::workspaces::member_role(workspace_id, user_id),
        "load member role",
        |row| row.get::<_, String>(0),
    )?;
    Ok(role.as_deref().and_then(WorkspaceRole::parse))
}

fn ensure_exists(conn: &Connection, workspace_id: &str) -> Result<(), ServiceError> {
    query_opt(conn, db::workspaces::get_by_id(workspace_id), "load workspace", |row| {
        row.get::<_, String>(0)
    })?
    .map(|_| ())
    .ok_or_else(|| ServiceError::NotFound("workspace not found".into()))
}

/// Any member passes; superadmins pass without a role.
pub fn require_member(
    conn: &Connection,
    workspace_id: &str,
    user: &AuthUser,
) -> Result<Option<WorkspaceRole>, ServiceError> {
    ensure_exists(conn, workspace_id)?;
    let role = role_of(conn, workspace_id, &user.user_id)?;
    if role.is_none() && !user.is_superadmin() {
        return Err(ServiceError::Forbidden(
            "not a member of this workspace".into(),
        ));
    }
    Ok(role)
}

pub fn require_admin(
    conn: &Connection,
    workspace_id: &str,
    user: &AuthUser,
) -> Result<Option<WorkspaceRole>, ServiceError> {
    let role = require_member(conn, workspace_id, user)?;
    if role != Some(WorkspaceRole::Admin) && !user.is_superadmin() {
        return Err(ServiceError::Forbidden("workspace admin required".into()));
    }
    Ok(role)
}

// ─── Workspaces ─────────────────────────────────────────────────────────────

struct WorkspaceRow {
    id: String,
    slug: String,
    name: String,
    description: Option<String>,
    image_key: Option<String>,
    created_by: String,
    created_at: String,
    updated_at: String,
}

fn workspace_from_row(row: &Row<'_>) -> rusqlite::Result<WorkspaceRow> {
    Ok(WorkspaceRow {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        image_key: row.get(4)?,
        created_by: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl WorkspaceRow {
    fn into_response(self, config: &AppConfig) -> WorkspaceResponse {
        WorkspaceResponse {
            image_url: self.image_key.map(|k| config.blob_url(&k)),
            id: self.id,
            slug: self.slug,
            name: self.name,
            description: self.description,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn load(conn: &Connection, workspace_id: &str) -> Result<WorkspaceRow, ServiceError> {
    query_opt(
        conn,
        db::workspaces::get_by_id(workspace_id),
        "load workspace",
        workspace_from_row,
    )?
    .ok_or_else(|| ServiceError::NotFound("workspace not found".into()))
}

fn detail(
    conn: &Connection,
    config: &AppConfig,
    row: WorkspaceRow,
    my_role: Option<WorkspaceRole>,
) -> Result<WorkspaceDetailResponse, ServiceError> {
    let (member_count, form_count) = query_one(
        conn,
        db::workspaces::counts(&row.id),
        "count workspace",
        |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)),
    )?;
    Ok(WorkspaceDetailResponse {
        workspace: row.into_response(config),
        member_count,
        form_count,
        my_role,
    })
}

/// Display name of a workspace, for emails.
pub fn name_of(conn: &Connection, workspace_id: &str) -> Result<String, ServiceError> {
    Ok(load(conn, workspace_id)?.name)
}

/// Slug from the display name, suffixed when the name alone is too short
/// or reserved.
fn derived_slug(name: &str) -> String {
    let slug = slug::slugify(name);
    if slug::validate_slug(&slug).is_ok() {
        return slug;
    }
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    slug::with_suffix(&slug, &suffix[..6])
}

/// The creator becomes the first admin.
pub fn create(
    conn: &Connection,
    config: &AppConfig,
    user: &AuthUser,
    req: &CreateWorkspaceRequest,
) -> Result<WorkspaceDetailResponse, ServiceError> {
    let name = service::validate_workspace_name(&req.name)?;
    let slug = match req.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.to_lowercase(),
        None => derived_slug(&name),
    };
    slug::validate_slug(&slug)?;
    let description = service::normalize_description(req.description.as_deref())?;

    let id = uuid::Uuid::new_v4().to_string();
    let tx = conn
        .unchecked_transaction()
        .map_err(ServiceError::from_db("begin create workspace"))?;
    match execute(
        &tx,
        db::workspaces::insert(&id, &slug, &name, description.as_deref(), &user.user_id),
    ) {
        Ok(_) => {}
        Err(e) if is_constraint_violation(&e) => {
            return Err(ServiceError::Conflict(format!(
                "slug \"{slug}\" is already taken"
            )));
        }
        Err(e) => return Err(ServiceError::from_db("create workspace")(e)),
    }
    exec(
        &tx,
        db::workspaces::insert_member(&id, &user.user_id, WorkspaceRole::Admin.as_str()),
        "add workspace creator",
    )?;
    tx.commit()
        .map_err(ServiceError::from_db("commit create workspace"))?;

    tracing::info!(workspace_id = %id, %slug, "workspace created");
    detail(conn, config, load(conn, &id)?, Some(WorkspaceRole::Admin))
}

pub fn slug_available(
    conn: &Connection,
    raw: &str,
) -> Result<SlugAvailabilityResponse, ServiceError> {
    let slug = raw.trim().to_lowercase();
    if let Err(e) = slug::validate_slug(&slug) {
        return Ok(SlugAvailabilityResponse {
            slug,
            available: false,
            reason: Some(e.to_string()),
        });
    }
    let taken = query_one(conn, db::workspaces::slug_exists(&slug), "check slug", |r| {
        r.get::<_, bool>(0)
    })?;
    Ok(SlugAvailabilityResponse {
        slug,
        available: !taken,
        reason: taken.then(|| "slug is already taken".to_string()),
    })
}

/// Superadmins see every workspace.
pub fn list_for_user(
    conn: &Connection,
    config: &AppConfig,
    user: &AuthUser,
) -> Result<Vec<WorkspaceDetailResponse>, ServiceError> {
    let built = if user.is_superadmin() {
        db::workspaces::list_all()
    } else {
        db::workspaces::list_for_user(&user.user_id)
    };
    let rows = query_all(conn, built, "list workspaces", workspace_from_row)?;
    rows.into_iter()
        .map(|row| {
            let role = role_of(conn, &row.id, &user.user_id)?;
            detail(conn, config, row, role)
        })
        .collect()
}

pub fn get(
    conn: &Connection,
    config: &AppConfig,
    workspace_id: &str,
    user: &AuthUser,
) -> Result<WorkspaceDetailResponse, ServiceError> {
    let role = require_member(conn, workspace_id, user)?;
    detail(conn, config, load(conn, workspace_id)?, role)
}

pub fn get_by_slug(
    conn: &Connection,
    config: &AppConfig,
    slug: &str,
    user: &AuthUser,
) -> Result<WorkspaceDetailResponse, ServiceError> {
    let row = query_opt(
        conn,
        db::workspaces::get_by_slug(&slug.trim().to_lowercase()),
        "load workspace",
        workspace_from_row,
    )?
    .ok_or_else(|| ServiceError::NotFound("workspace not found".into()))?;
    let role = require_member(conn, &row.id, user)?;
    detail(conn, config, row, role)
}

/// Slugs are immutable: resending the current slug is accepted, anything
/// else is rejected.
pub fn update(
    conn: &Connection,
    config: &AppConfig,
    workspace_id: &str,
    user: &AuthUser,
    req: &UpdateWorkspaceRequest,
) -> Result<WorkspaceDetailResponse, ServiceError> {
    let role = require_admin(conn, workspace_id, user)?;
    let current = load(conn, workspace_id)?;
    if let Some(slug) = req.slug.as_deref() {
        if slug.trim().to_lowercase() != current.slug {
            return Err(ServiceError::BadRequest(
                "workspace slug cannot be changed".into(),
            ));
        }
    }
    let name = match req.name.as_deref() {
        Some(n) => service::validate_workspace_name(n)?,
        None => current.name.clone(),
    };
    let description = match req.description.as_deref() {
        Some(d) => service::normalize_description(Some(d))?,
        None => current.description.clone(),
    };
    exec(
        conn,
        db::workspaces::update(workspace_id, &name, description.as_deref()),
        "update workspace",
    )?;
    detail(conn, config, load(conn, workspace_id)?, role)
}

pub fn set_image(
    conn: &Connection,
    config: &AppConfig,
    blobs: &dyn BlobStore,
    workspace_id: &str,
    user: &AuthUser,
    content_type: &str,
    bytes: &[u8],
) -> Result<ImageUploadResponse, ServiceError> {
    require_admin(conn, workspace_id, user)?;
    let content_type = upload::check(UploadKind::WorkspaceImage, content_type, bytes.len())?;
    let previous = load(conn, workspace_id)?.image_key;

    let key = blob::workspace_image_key(workspace_id, upload::extension_for(&content_type));
    blobs.put(&key, bytes)?;
    if let Err(e) = exec(
        conn,
        db::workspaces::set_image_key(workspace_id, &key),
        "set workspace image",
    ) {
        let _ = blobs.delete(&key);
        return Err(e);
    }
    if let Some(old) = previous {
        if let Err(e) = blobs.delete(&old) {
            tracing::warn!("failed to remove old workspace image {old}: {e}");
        }
    }
    Ok(ImageUploadResponse {
        url: config.blob_url(&key),
        key,
    })
}

/// Deletes the workspace and everything under it. Returns the blob keys the
/// caller should remove.
pub fn delete(
    conn: &Connection,
    workspace_id: &str,
    user: &AuthUser,
) -> Result<Vec<String>, ServiceError> {
    require_admin(conn, workspace_id, user)?;
    let image_key = load(conn, workspace_id)?.image_key;
    let mut keys = query_all(
        conn,
        db::responses::storage_keys_for_workspace(workspace_id),
        "collect attachment keys",
        |row| row.get::<_, String>(0),
    )?;
    keys.extend(image_key);
    exec(conn, db::workspaces::delete(workspace_id), "delete workspace")?;
    tracing::info!(%workspace_id, blobs = keys.len(), "workspace deleted");
    Ok(keys)
}

// ─── Members ────────────────────────────────────────────────────────────────

fn member_from_row(row: &Row<'_>, config: &AppConfig) -> rusqlite::Result<MemberResponse> {
    let image_key: Option<String> = row.get(3)?;
    let role: String = row.get(4)?;
    Ok(MemberResponse {
        user_id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        image_url: image_key.map(|k| config.blob_url(&k)),
        role: WorkspaceRole::parse(&role).unwrap_or_default(),
        joined_at: row.get(5)?,
    })
}

pub fn list_members(
    conn: &Connection,
    config: &AppConfig,
    workspace_id: &str,
    user: &AuthUser,
) -> Result<Vec<MemberResponse>, ServiceError> {
    require_member(conn, workspace_id, user)?;
    query_all(
        conn,
        db::workspaces::list_members(workspace_id),
        "list members",
        |row| member_from_row(row, config),
    )
}

fn count_admins(conn: &Connection, workspace_id: &str) -> Result<i64, ServiceError> {
    query_one(conn, db::workspaces::count_admins(workspace_id), "count admins", |r| {
        r.get(0)
    })
}

fn target_role(
    conn: &Connection,
    workspace_id: &str,
    target_user_id: &str,
) -> Result<WorkspaceRole, ServiceError> {
    role_of(conn, workspace_id, target_user_id)?
        .ok_or_else(|| ServiceError::NotFound("member not found".into()))
}

pub fn update_member_role(
    conn: &Connection,
    config: &AppConfig,
    workspace_id: &str,
    user: &AuthUser,
    target_user_id: &str,
    role: WorkspaceRole,
) -> Result<MemberResponse, ServiceError> {
    require_admin(conn, workspace_id, user)?;
    let current = target_role(conn, workspace_id, target_user_id)?;
    if current == WorkspaceRole::Admin
        && role != WorkspaceRole::Admin
        && count_admins(conn, workspace_id)? <= 1
    {
        return Err(ServiceError::Conflict(
            "a workspace needs at least one admin".into(),
        ));
    }
    exec(
        conn,
        db::workspaces::update_member_role(workspace_id, target_user_id, role.as_str()),
        "update member role",
    )?;
    list_members(conn, config, workspace_id, user)?
        .into_iter()
        .find(|m| m.user_id == target_user_id)
        .ok_or_else(|| ServiceError::NotFound("member not found".into()))
}

/// Admins remove anyone; members may remove themselves (leave).
pub fn remove_member(
    conn: &Connection,
    workspace_id: &str,
    user: &AuthUser,
    target_user_id: &str,
) -> Result<(), ServiceError> {
    if target_user_id == user.user_id {
        require_member(conn, workspace_id, user)?;
    } else {
        require_admin(conn, workspace_id, user)?;
    }
    let current = target_role(conn, workspace_id, target_user_id)?;
    if current == WorkspaceRole::Admin && count_admins(conn, workspace_id)? <= 1 {
        return Err(ServiceError::Conflict(
            "the last admin cannot leave or be removed".into(),
        ));
    }
    exec(
        conn,
        db::workspaces::delete_member(workspace_id, target_user_id),
        "remove member",
    )?;
    Ok(())
}

/// Emails of every admin, for submission notifications.
pub fn admin_emails(conn: &Connection, workspace_id: &str) -> Result<Vec<String>, ServiceError> {
    query_all(
        conn,
        db::workspaces::admin_emails(workspace_id),
        "list admin emails",
        |row| row.get(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{fixture, superadmin, user};

    fn create_req(name: &str, slug: Option<&str>) -> CreateWorkspaceRequest {
        CreateWorkspaceRequest {
            name: name.into(),
            slug: slug.map(Into::into),
            description: None,
        }
    }

    #[test]
    fn test_create_derives_slug_and_makes_creator_admin() {
        let fx = fixture();
        let ada = user(&fx, "u1", "ada@example.com");
        let conn = fx.db.conn();

        let ws = create(&conn, &fx.config, &ada, &create_req("Acme Studio!", None)).unwrap();
        assert_eq!(ws.workspace.slug, "acme-studio");
        assert_eq!(ws.my_role, Some(WorkspaceRole::Admin));
        assert_eq!(ws.member_count, 1);
        assert_eq!(ws.form_count, 0);
    }

    #[test]
    fn test_short_or_non_latin_names_get_a_suffixed_slug() {
        let fx = fixture();
        let ada = user(&fx, "u1", "ada@example.com");
        let conn = fx.db.conn();

        let short = create(&conn, &fx.config, &ada, &create_req("AB", None)).unwrap();
        assert!(short.workspace.slug.starts_with("ab-"));
        let cjk = create(&conn, &fx.config, &ada, &create_req("日本", None)).unwrap();
        assert!(cjk.workspace.slug.starts_with("workspace-"));
        for slug in [&short.workspace.slug, &cjk.workspace.slug] {
            assert_eq!(slug::validate_slug(slug), Ok(()));
        }

        let err = create(&conn, &fx.config, &ada, &create_req("AB", Some("ab"))).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_duplicate_and_reserved_slugs() {
        let fx = fixture();
        let ada = user(&fx, "u1", "ada@example.com");
        let conn = fx.db.conn();

        create(&conn, &fx.config, &ada, &create_req("Acme", Some("acme"))).unwrap();
        let err = create(&conn, &fx.config, &ada, &create_req("Acme 2", Some("acme"))).unwrap_err();
        assert_eq!(err.status_code(), 409);
        let err = create(&conn, &fx.config, &ada, &create_req("Api", Some("api"))).unwrap_err();
        assert_eq!(err.status_code(), 400);

        assert!(!slug_available(&conn, "acme").unwrap().available);
        assert!(slug_available(&conn, "Acme-2").unwrap().available);
        let bad = slug_available(&conn, "a").unwrap();
        assert!(!bad.available);
        assert!(bad.reason.is_some());
    }

    #[test]
    fn test_slug_is_immutable() {
        let fx = fixture();
        let ada = user(&fx, "u1", "ada@example.com");
        let conn = fx.db.conn();
        let ws = create(&conn, &fx.config, &ada, &create_req("Acme", None)).unwrap();
        let id = ws.workspace.id;

        let err = update(
            &conn,
            &fx.config,
            &id,
            &ada,
            &UpdateWorkspaceRequest {
                slug: Some("other".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let updated = update(
            &conn,
            &fx.config,
            &id,
            &ada,
            &UpdateWorkspaceRequest {
                name: Some("Acme Inc".into()),
                slug: Some("acme".into()),
                description: Some("We make forms".into()),
            },
        )
        .unwrap();
        assert_eq!(updated.workspace.name, "Acme Inc");
        assert_eq!(updated.workspace.slug, "acme");
        assert_eq!(
            updated.workspace.description.as_deref(),
            Some("We make forms")
        );
    }

    #[test]
    fn test_access_rules() {
        let fx = fixture();
        let ada = user(&fx, "u1", "ada@example.com");
        let bob = user(&fx, "u2", "bob@example.com");
        let root = superadmin(&fx, "u3", "root@tinta.agency");
        let conn = fx.db.conn();
        let id = create(&conn, &fx.config, &ada, &create_req("Acme", None))
            .unwrap()
            .workspace
            .id;

        assert_eq!(get(&conn, &fx.config, &id, &bob).unwrap_err().status_code(), 403);
        assert_eq!(
            get(&conn, &fx.config, "missing", &ada).unwrap_err().status_code(),
            404
        );
        let seen = get(&conn, &fx.config, &id, &root).unwrap();
        assert_eq!(seen.my_role, None);

        assert!(list_for_user(&conn, &fx.config, &bob).unwrap().is_empty());
        assert_eq!(list_for_user(&conn, &fx.config, &root).unwrap().len(), 1);

        exec(&conn, db::workspaces::insert_member(&id, "u2", "member"), "add").unwrap();
        assert!(get_by_slug(&conn, &fx.config, "ACME", &bob).is_ok());
        let err = update(&conn, &fx.config, &id, &bob, &UpdateWorkspaceRequest::default())
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_last_admin_guard() {
        let fx = fixture();
        let ada = user(&fx, "u1", "ada@example.com");
        let bob = user(&fx, "u2", "bob@example.com");
        let conn = fx.db.conn();
        let id = create(&conn, &fx.config, &ada, &create_req("Acme", None))
            .unwrap()
            .workspace
            .id;
        exec(&conn, db::workspaces::insert_member(&id, "u2", "member"), "add").unwrap();

        let err = update_member_role(&conn, &fx.config, &id, &ada, "u1", WorkspaceRole::Member)
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
        let err = remove_member(&conn, &id, &ada, "u1").unwrap_err();
        assert_eq!(err.status_code(), 409);

        // Members cannot remove others but may leave.
        assert_eq!(
            remove_member(&conn, &id, &bob, "u1").unwrap_err().status_code(),
            403
        );

        let promoted =
            update_member_role(&conn, &fx.config, &id, &ada, "u2", WorkspaceRole::Admin).unwrap();
        assert_eq!(promoted.role, WorkspaceRole::Admin);
        update_member_role(&conn, &fx.config, &id, &ada, "u1", WorkspaceRole::Member).unwrap();
        remove_member(&conn, &id, &ada, "u1").unwrap();

        let members = list_members(&conn, &fx.config, &id, &bob).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(admin_emails(&conn, &id).unwrap(), vec!["bob@example.com"]);
    }

    #[test]
    fn test_delete_returns_blob_keys() {
        let fx = fixture();
        let ada = user(&fx, "u1", "ada@example.com");
        let conn = fx.db.conn();
        let id = create(&conn, &fx.config, &ada, &create_req("Acme", None))
            .unwrap()
            .workspace
            .id;
        let image = set_image(
            &conn,
            &fx.config,
            fx.db.blobs(),
            &id,
            &ada,
            "image/png",
            b"png",
        )
        .unwrap();
        let too_big = vec![0u8; UploadKind::WorkspaceImage.max_bytes() + 1];
        let err = set_image(&conn, &fx.config, fx.db.blobs(), &id, &ada, "image/png", &too_big)
            .unwrap_err();
        assert_eq!(err.status_code(), 413);

        let keys = delete(&conn, &id, &ada).unwrap();
        assert_eq!(keys, vec![image.key]);
        assert_eq!(
            get(&conn, &fx.config, &id, &ada).unwrap_err().status_code(),
            404
        );
    }
}
