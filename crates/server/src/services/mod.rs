//! Domain services.
//!
//! Each function runs synchronously against a borrowed connection and returns
//! `Result<_, ServiceError>`. Route handlers lock the connection, call in, and
//! drop the guard before awaiting anything (email, PDF rendering).

pub mod forms;
pub mod invitations;
pub mod responses;
pub mod templates;
pub mod users;
pub mod workspaces;

use tinta_api::{ServiceError, service};

pub use workspaces::{require_admin, require_member};

pub fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Current time in the SQLite `datetime()` format used by every column.
pub fn now_sql() -> Result<String, ServiceError> {
    service::sqlite_now(now_unix())
}

/// Parse a JSON text column, tolerating legacy garbage as `null`.
pub(crate) fn json_column(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or(serde_json::Value::Null)
}
