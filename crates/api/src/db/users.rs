//! User / auth query builders.

use sea_query::{Expr, OnConflict, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::{OtpCodes, RefreshTokens, Users};

// ── User lookups ───────────────────────────────────────────────────────────

/// Column order: id, email, name, image_key, role, onboarded, created_at.
fn user_select() -> sea_query::SelectStatement {
    Query::select()
        .columns([
            Users::Id,
            Users::Email,
            Users::Name,
            Users::ImageKey,
            Users::Role,
            Users::Onboarded,
            Users::CreatedAt,
        ])
        .from(Users::Table)
        .to_owned()
}

pub fn get_by_id(user_id: &str) -> Built {
    user_select()
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

pub fn get_by_email(email: &str) -> Built {
    user_select()
        .and_where(Expr::col(Users::Email).eq(email))
        .build(SqliteQueryBuilder)
}

// ── User mutations ─────────────────────────────────────────────────────────

/// INSERT a user who has not completed onboarding yet.
pub fn insert(id: &str, email: &str, role: Option<&str>) -> Built {
    Query::insert()
        .into_table(Users::Table)
        .columns([Users::Id, Users::Email, Users::Role, Users::Onboarded])
        .values_panic([
            id.into(),
            email.into(),
            role.map(str::to_string).into(),
            false.into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn set_role(id: &str, role: Option<&str>) -> Built {
    Query::update()
        .table(Users::Table)
        .value(Users::Role, role.map(str::to_string))
        .and_where(Expr::col(Users::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn update_name(id: &str, name: &str) -> Built {
    Query::update()
        .table(Users::Table)
        .value(Users::Name, name)
        .and_where(Expr::col(Users::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Set the name and flip `onboarded` in one statement.
pub fn complete_onboarding(id: &str, name: &str) -> Built {
    Query::update()
        .table(Users::Table)
        .value(Users::Name, name)
        .value(Users::Onboarded, true)
        .and_where(Expr::col(Users::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn set_image_key(id: &str, image_key: &str) -> Built {
    Query::update()
        .table(Users::Table)
        .value(Users::ImageKey, image_key)
        .and_where(Expr::col(Users::Id).eq(id))
        .build(SqliteQueryBuilder)
}

// ── One-time codes ─────────────────────────────────────────────────────────

/// INSERT or replace the pending code for an email, resetting attempts.
pub fn upsert_otp(email: &str, code_hash: &str, expires_at: &str) -> Built {
    Query::insert()
        .into_table(OtpCodes::Table)
        .columns([
            OtpCodes::Email,
            OtpCodes::CodeHash,
            OtpCodes::Attempts,
            OtpCodes::ExpiresAt,
        ])
        .values_panic([email.into(), code_hash.into(), 0i64.into(), expires_at.into()])
        .on_conflict(
            OnConflict::column(OtpCodes::Email)
                .update_columns([OtpCodes::CodeHash, OtpCodes::Attempts, OtpCodes::ExpiresAt])
                .to_owned(),
        )
        .build(SqliteQueryBuilder)
}

/// Column order: code_hash, attempts, expires_at.
pub fn get_otp(email: &str) -> Built {
    Query::select()
        .columns([OtpCodes::CodeHash, OtpCodes::Attempts, OtpCodes::ExpiresAt])
        .from(OtpCodes::Table)
        .and_where(Expr::col(OtpCodes::Email).eq(email))
        .build(SqliteQueryBuilder)
}

pub fn increment_otp_attempts(email: &str) -> Built {
    Query::update()
        .table(OtpCodes::Table)
        .value(OtpCodes::Attempts, Expr::col(OtpCodes::Attempts).add(1))
        .and_where(Expr::col(OtpCodes::Email).eq(email))
        .build(SqliteQueryBuilder)
}

pub fn delete_otp(email: &str) -> Built {
    Query::delete()
        .from_table(OtpCodes::Table)
        .and_where(Expr::col(OtpCodes::Email).eq(email))
        .build(SqliteQueryBuilder)
}

// ── Refresh tokens ─────────────────────────────────────────────────────────

pub fn insert_refresh_token(id: &str, user_id: &str, token_hash: &str, expires_at: &str) -> Built {
    Query::insert()
        .into_table(RefreshTokens::Table)
        .columns([
            RefreshTokens::Id,
            RefreshTokens::UserId,
            RefreshTokens::TokenHash,
            RefreshTokens::ExpiresAt,
        ])
        .values_panic([
            id.into(),
            user_id.into(),
            token_hash.into(),
            expires_at.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Owner of a refresh token that is still valid at `now`.
/// Column order: user_id, email.
pub fn refresh_token_owner(token_hash: &str, now: &str) -> Built {
    Query::select()
        .column((RefreshTokens::Table, RefreshTokens::UserId))
        .column((Users::Table, Users::Email))
        .from(RefreshTokens::Table)
        .inner_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id))
                .equals((RefreshTokens::Table, RefreshTokens::UserId)),
        )
        .and_where(Expr::col((RefreshTokens::Table, RefreshTokens::TokenHash)).eq(token_hash))
        .and_where(Expr::col((RefreshTokens::Table, RefreshTokens::ExpiresAt)).gt(now))
        .build(SqliteQueryBuilder)
}

pub fn delete_refresh_token(token_hash: &str) -> Built {
    Query::delete()
        .from_table(RefreshTokens::Table)
        .and_where(Expr::col(RefreshTokens::TokenHash).eq(token_hash))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_otp_resets_on_conflict() {
        let (sql, values) = upsert_otp("a@b.co", "hash", "2030-01-01 00:00:00");
        assert!(sql.starts_with(r#"INSERT INTO "otp_codes""#));
        assert!(sql.contains("ON CONFLICT"));
        assert!(sql.contains(r#""excluded"."attempts""#));
        assert_eq!(values.0.len(), 4);
    }

    #[test]
    fn test_refresh_token_owner_filters_expiry() {
        let (sql, values) = refresh_token_owner("h", "2025-01-01 00:00:00");
        assert!(sql.contains(r#""refresh_tokens"."expires_at" > ?"#));
        assert_eq!(values.0.len(), 2);
    }
}
