//! Compile-time–checked column identifiers for all tables.

use sea_query::Iden;

#[derive(Iden)]
pub enum Users {
    Table,
    Id,
    Email,
    Name,
    ImageKey,
    Role,
    Onboarded,
    CreatedAt,
}

#[derive(Iden)]
pub enum OtpCodes {
    Table,
    Email,
    CodeHash,
    Attempts,
    ExpiresAt,
    CreatedAt,
}

#[derive(Iden)]
pub enum RefreshTokens {
    Table,
    Id,
    UserId,
    TokenHash,
    ExpiresAt,
    CreatedAt,
}

#[derive(Iden)]
pub enum Workspaces {
    Table,
    Id,
    Slug,
    Name,
    Description,
    ImageKey,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum WorkspaceUsers {
    Table,
    WorkspaceId,
    UserId,
    Role,
    JoinedAt,
}

#[derive(Iden)]
pub enum WorkspaceInvitations {
    Table,
    Id,
    WorkspaceId,
    Email,
    Role,
    Token,
    InvitedBy,
    Status,
    ExpiresAt,
    AcceptedBy,
    AcceptedAt,
    CreatedAt,
}

#[derive(Iden)]
pub enum FormTemplates {
    Table,
    Id,
    Name,
    Description,
    Fields,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum Forms {
    Table,
    Id,
    WorkspaceId,
    TemplateId,
    Title,
    Description,
    Fields,
    ShareToken,
    IsActive,
    AllowMultipleSubmissions,
    NotifyOnSubmission,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum FormResponses {
    Table,
    Id,
    FormId,
    Data,
    Status,
    RespondentEmail,
    RespondentKey,
    Metadata,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum FormResponseFiles {
    Table,
    Id,
    ResponseId,
    FieldId,
    FileName,
    ContentType,
    SizeBytes,
    StorageKey,
    CreatedAt,
}
