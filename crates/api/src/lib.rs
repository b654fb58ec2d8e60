//! Shared API types, crypto, and SQL builders for Tinta.
//!
//! This crate is the **single source of truth** for all API request/response
//! types. The server uses it with the `backend` feature; clients only need the
//! plain types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(feature = "backend")]
pub mod crypto;
#[cfg(feature = "backend")]
pub mod db;
#[cfg(feature = "backend")]
pub mod service;

pub use tinta_core::{FieldDescriptor, FieldKind};

// ─── Shared Enums ────────────────────────────────────────────────────────────

/// Platform-wide role. Users without one are regular users.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GlobalRole {
    Superadmin,
}

impl GlobalRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Superadmin => "superadmin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "superadmin" => Some(Self::Superadmin),
            _ => None,
        }
    }
}

/// Role within a workspace.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceRole {
    Admin,
    #[default]
    Member,
}

impl WorkspaceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkspaceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a workspace invitation.
///
/// `Expired` is never stored; it is derived from a pending row whose
/// `expires_at` has passed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
    Canceled,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Expired => "expired",
            Self::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "expired" => Some(Self::Expired),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }
}

impl std::fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review status of a form response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    #[default]
    New,
    Reviewed,
    Processed,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Reviewed => "reviewed",
            Self::Processed => "processed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "reviewed" => Some(Self::Reviewed),
            "processed" => Some(Self::Processed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Auth ────────────────────────────────────────────────────────────────────

/// Ask for a one-time login code to be emailed.
#[derive(Debug, Serialize, Deserialize)]
pub struct OtpRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OtpRequestResponse {
    pub success: bool,
    /// Seconds until the code expires.
    pub expires_in: u64,
}

/// Exchange an emailed code for tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct OtpVerifyRequest {
    pub email: String,
    pub code: String,
}

/// Returned on successful OTP verification / refresh.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user_id: String,
    pub email: String,
    /// True when this login created the account; clients route to onboarding.
    pub is_new_user: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

/// Full user profile returned by `GET /api/auth/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub role: Option<GlobalRole>,
    pub onboarded: bool,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OnboardingRequest {
    pub name: String,
}

/// Returned after an image upload (avatar or workspace image).
#[derive(Debug, Serialize, Deserialize)]
pub struct ImageUploadResponse {
    pub key: String,
    pub url: String,
}

// ─── Workspaces ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateWorkspaceRequest {
    pub name: String,
    /// Derived from `name` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateWorkspaceRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Slugs are immutable; sending one is rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceResponse {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Workspace plus the caller's view of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceDetailResponse {
    #[serde(flatten)]
    pub workspace: WorkspaceResponse,
    pub member_count: i64,
    pub form_count: i64,
    /// `None` for superadmins browsing a workspace they are not part of.
    pub my_role: Option<WorkspaceRole>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListWorkspacesResponse {
    pub workspaces: Vec<WorkspaceDetailResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SlugAvailabilityQuery {
    pub slug: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SlugAvailabilityResponse {
    pub slug: String,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ─── Members ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberResponse {
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub role: WorkspaceRole,
    pub joined_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListMembersResponse {
    pub members: Vec<MemberResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateMemberRoleRequest {
    pub role: WorkspaceRole,
}

// ─── Invitations ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateInvitationRequest {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<WorkspaceRole>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationResponse {
    pub id: String,
    pub workspace_id: String,
    pub workspace_name: String,
    pub email: String,
    pub role: WorkspaceRole,
    pub status: InvitationStatus,
    pub invited_by: Option<String>,
    pub expires_at: String,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListInvitationsResponse {
    pub invitations: Vec<InvitationResponse>,
}

/// What an invitee sees when opening `/invite/{token}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct InvitationLookupResponse {
    pub workspace_id: String,
    pub workspace_name: String,
    pub workspace_slug: String,
    pub email: String,
    pub role: WorkspaceRole,
    pub status: InvitationStatus,
    pub expires_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptInvitationResponse {
    pub workspace_id: String,
    pub workspace_slug: String,
    pub role: WorkspaceRole,
}

// ─── Templates ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateTemplateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldDescriptor>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<FieldDescriptor>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListTemplatesResponse {
    pub templates: Vec<TemplateResponse>,
}

/// Full ordering of a field list, by id.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReorderFieldsRequest {
    pub field_ids: Vec<String>,
}

/// Single drag-and-drop move, by index.
#[derive(Debug, Serialize, Deserialize)]
pub struct MoveFieldRequest {
    pub from: usize,
    pub to: usize,
}

// ─── Forms ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateFormRequest {
    /// Defaults to the template name when created from a template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    /// Ignored when `template_id` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_multiple_submissions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_on_submission: Option<bool>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateFormRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_multiple_submissions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_on_submission: Option<bool>,
}

/// A form as seen by workspace members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormInfo {
    pub id: String,
    pub workspace_id: String,
    pub template_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub fields: Vec<FieldDescriptor>,
    pub share_token: String,
    pub share_url: String,
    pub is_active: bool,
    pub allow_multiple_submissions: bool,
    pub notify_on_submission: bool,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormListItem {
    #[serde(flatten)]
    pub form: FormInfo,
    pub response_count: i64,
    pub new_response_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListFormsResponse {
    pub forms: Vec<FormListItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShareTokenResponse {
    pub share_token: String,
    pub share_url: String,
}

/// Unauthenticated view of a form behind its share token.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicForm {
    pub title: String,
    pub description: Option<String>,
    pub fields: Vec<FieldDescriptor>,
    pub workspace_name: String,
    pub allow_multiple_submissions: bool,
}

/// Returned after a public submission is stored.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub success: bool,
    pub response_id: String,
    pub submitted_at: String,
}

// ─── Responses ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ResponseListQuery {
    #[serde(default)]
    pub status: Option<ResponseStatus>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}
fn default_per_page() -> u32 {
    20
}

impl ResponseListQuery {
    /// Clamp paging to sane bounds; returns `(limit, offset)`.
    pub fn limit_offset(&self) -> (u32, u32) {
        let per_page = self.per_page.clamp(1, 100);
        let page = self.page.max(1);
        (per_page, (page - 1).saturating_mul(per_page))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFileInfo {
    pub id: String,
    pub field_id: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub download_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSummary {
    pub id: String,
    pub form_id: String,
    pub status: ResponseStatus,
    pub respondent_email: Option<String>,
    pub data: Value,
    pub file_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseListResponse {
    pub responses: Vec<ResponseSummary>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseDetail {
    pub id: String,
    pub form_id: String,
    pub form_title: String,
    pub workspace_id: String,
    pub status: ResponseStatus,
    pub respondent_email: Option<String>,
    pub data: Value,
    pub metadata: Value,
    pub files: Vec<ResponseFileInfo>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateResponseStatusRequest {
    pub status: ResponseStatus,
}

// ─── Misc ────────────────────────────────────────────────────────────────────

/// Generic success response for operations that don't return data.
#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub success: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Returned by `GET /api/health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// ─── Service Error ───────────────────────────────────────────────────────────

/// Framework-agnostic service error.
///
/// Domain services return this; the HTTP layer maps it to a status code and
/// the `{ "success": false, "error": "..." }` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    /// Terminal state the caller cannot recover from (expired invitation,
    /// inactive form).
    Gone(String),
    PayloadTooLarge(String),
    /// An external integration is not configured or not reachable.
    Unavailable(String),
    Internal(String),
}

impl ServiceError {
    /// HTTP status code as a `u16`.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Gone(_) => 410,
            Self::PayloadTooLarge(_) => 413,
            Self::Unavailable(_) => 503,
            Self::Internal(_) => 500,
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::Gone(m)
            | Self::PayloadTooLarge(m)
            | Self::Unavailable(m)
            | Self::Internal(m) => m,
        }
    }

    /// Build a closure that wraps a DB/IO error into `Internal` with context.
    pub fn from_db<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> Self + '_ {
        move |e| Self::Internal(format!("{context}: {e}"))
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ServiceError {}

impl From<tinta_core::SchemaError> for ServiceError {
    fn from(e: tinta_core::SchemaError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<tinta_core::slug::SlugError> for ServiceError {
    fn from(e: tinta_core::slug::SlugError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<tinta_core::upload::UploadError> for ServiceError {
    fn from(e: tinta_core::upload::UploadError) -> Self {
        match e {
            tinta_core::upload::UploadError::TooLarge { .. } => {
                Self::PayloadTooLarge(e.to_string())
            }
            _ => Self::BadRequest(e.to_string()),
        }
    }
}

impl From<Vec<tinta_core::ValidationError>> for ServiceError {
    fn from(errors: Vec<tinta_core::ValidationError>) -> Self {
        let joined = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Self::BadRequest(joined)
    }
}

impl From<tinta_core::blob::BlobError> for ServiceError {
    fn from(e: tinta_core::blob::BlobError) -> Self {
        match e {
            tinta_core::blob::BlobError::NotFound(_) => Self::NotFound("file not found".into()),
            other => Self::Internal(format!("blob storage: {other}")),
        }
    }
}

/// JSON error shape `{ "success": false, "error": "..." }` returned by all
/// error responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
}

impl From<&ServiceError> for ApiError {
    fn from(e: &ServiceError) -> Self {
        Self {
            success: false,
            error: e.message().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_round_trip_strings() {
        for role in [WorkspaceRole::Admin, WorkspaceRole::Member] {
            assert_eq!(WorkspaceRole::parse(role.as_str()), Some(role));
        }
        for status in [
            ResponseStatus::New,
            ResponseStatus::Reviewed,
            ResponseStatus::Processed,
        ] {
            assert_eq!(ResponseStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(InvitationStatus::parse("declined"), None);
        assert_eq!(
            serde_json::to_string(&InvitationStatus::Canceled).unwrap(),
            "\"canceled\""
        );
    }

    #[test]
    fn test_service_error_mapping() {
        let e = ServiceError::from(tinta_core::upload::UploadError::TooLarge {
            kind: "avatar",
            max_mb: 5,
        });
        assert_eq!(e.status_code(), 413);

        let e = ServiceError::from(vec![
            tinta_core::ValidationError::MissingRequired { field: "a".into() },
            tinta_core::ValidationError::UnknownField { field: "b".into() },
        ]);
        assert_eq!(e.status_code(), 400);
        assert_eq!(e.message(), "a: this field is required; b: unknown field");

        let body = ApiError::from(&ServiceError::Gone("form is closed".into()));
        assert!(!body.success);
        assert_eq!(body.error, "form is closed");
    }

    #[test]
    fn test_response_list_paging() {
        let q: ResponseListQuery = serde_json::from_str(r#"{"page":3,"per_page":500}"#).unwrap();
        assert_eq!(q.limit_offset(), (100, 200));
        let q: ResponseListQuery = serde_json::from_str(r#"{"page":0}"#).unwrap();
        assert_eq!(q.limit_offset(), (20, 0));
    }
}
