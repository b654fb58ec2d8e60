use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use tinta_api::{GlobalRole, crypto, db};

use crate::config::AppConfig;
use crate::error::ApiErr;
use crate::services::now_unix;
use crate::storage::{self, Db};

/// Authenticated user extracted from the `Authorization: Bearer <jwt>` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub role: Option<GlobalRole>,
}

impl AuthUser {
    pub fn is_superadmin(&self) -> bool {
        self.role == Some(GlobalRole::Superadmin)
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Db: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        if config.jwt_secret.is_empty() {
            return Err(ApiErr::from(tinta_api::ServiceError::Unavailable(
                "JWT authentication not configured".into(),
            )));
        }

        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| ApiErr::unauthorized("missing or invalid Authorization header"))?;

        let user_id = crypto::verify_jwt(token, &config.jwt_secret, now_unix())?;

        let db = Db::from_ref(state);
        let conn = db.conn();
        storage::query_opt(&conn, db::users::get_by_id(&user_id), "load auth user", |row| {
            Ok(AuthUser {
                user_id: row.get(0)?,
                email: row.get(1)?,
                role: row
                    .get::<_, Option<String>>(4)?
                    .as_deref()
                    .and_then(GlobalRole::parse),
            })
        })?
        .ok_or_else(|| ApiErr::unauthorized("user no longer exists"))
    }
}
