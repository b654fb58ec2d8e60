use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tinta_api::ServiceError;
use tinta_api::db::Built;
use tinta_api::db::migrations::MIGRATIONS;
use tinta_core::blob::{BlobStore, LocalBlobStore};

/// Shared database + blob state
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
    blobs: Arc<dyn BlobStore>,
}

impl Db {
    pub fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    pub fn blobs(&self) -> &dyn BlobStore {
        self.blobs.as_ref()
    }
}

/// Initialize the database: open connection, enable WAL, run migrations
pub fn init_db(data_dir: &Path) -> Result<Db> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("tinta.db");
    let conn = Connection::open(&db_path).context("opening SQLite database")?;

    // Enable WAL mode for better concurrent read performance
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    run_migrations(&conn)?;

    Ok(Db {
        conn: Arc::new(Mutex::new(conn)),
        blobs: Arc::new(LocalBlobStore::new(data_dir.join("blobs"))),
    })
}

/// In-memory database with blobs under `blob_root`. Used by tests.
pub fn open_in_memory(blob_root: &Path) -> Result<Db> {
    let conn = Connection::open_in_memory().context("opening in-memory SQLite")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    run_migrations(&conn)?;
    Ok(Db {
        conn: Arc::new(Mutex::new(conn)),
        blobs: Arc::new(LocalBlobStore::new(blob_root)),
    })
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
            [name],
            |row| row.get(0),
        )?;

        if !already_applied {
            conn.execute_batch(sql)
                .with_context(|| format!("running migration {name}"))?;
            conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])?;
            tracing::info!("Applied migration: {name}");
        }
    }

    Ok(())
}

// ─── sea-query bridge ───────────────────────────────────────────────────────

/// Convert `sea_query::Values` into rusqlite bind params.
pub fn sq_params(values: &sea_query::Values) -> Vec<rusqlite::types::Value> {
    use rusqlite::types::Value as Sql;
    use sea_query::Value as Sq;

    values
        .0
        .iter()
        .map(|v| match v {
            Sq::Bool(Some(b)) => Sql::Integer(i64::from(*b)),
            Sq::TinyInt(Some(i)) => Sql::Integer(i64::from(*i)),
            Sq::SmallInt(Some(i)) => Sql::Integer(i64::from(*i)),
            Sq::Int(Some(i)) => Sql::Integer(i64::from(*i)),
            Sq::BigInt(Some(i)) => Sql::Integer(*i),
            Sq::TinyUnsigned(Some(u)) => Sql::Integer(i64::from(*u)),
            Sq::SmallUnsigned(Some(u)) => Sql::Integer(i64::from(*u)),
            Sq::Unsigned(Some(u)) => Sql::Integer(i64::from(*u)),
            Sq::BigUnsigned(Some(u)) => Sql::Integer(i64::try_from(*u).unwrap_or(i64::MAX)),
            Sq::Float(Some(f)) => Sql::Real(f64::from(*f)),
            Sq::Double(Some(f)) => Sql::Real(*f),
            Sq::String(Some(s)) => Sql::Text((**s).clone()),
            Sq::Char(Some(c)) => Sql::Text(c.to_string()),
            Sq::Bytes(Some(b)) => Sql::Blob((**b).clone()),
            _ => Sql::Null,
        })
        .collect()
}

/// Run a built statement, returning affected rows.
pub fn execute(conn: &Connection, built: Built) -> rusqlite::Result<usize> {
    let (sql, values) = built;
    conn.execute(&sql, rusqlite::params_from_iter(sq_params(&values)))
}

pub fn exec(conn: &Connection, built: Built, context: &str) -> Result<usize, ServiceError> {
    execute(conn, built).map_err(ServiceError::from_db(context))
}

pub fn query_opt<T>(
    conn: &Connection,
    built: Built,
    context: &str,
    map: impl FnOnce(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Option<T>, ServiceError> {
    let (sql, values) = built;
    conn.query_row(&sql, rusqlite::params_from_iter(sq_params(&values)), map)
        .optional()
        .map_err(ServiceError::from_db(context))
}

/// Like [`query_opt`] for queries that always yield a row (aggregates).
pub fn query_one<T>(
    conn: &Connection,
    built: Built,
    context: &str,
    map: impl FnOnce(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<T, ServiceError> {
    query_opt(conn, built, context, map)?
        .ok_or_else(|| ServiceError::Internal(format!("{context}: no row")))
}

pub fn query_all<T>(
    conn: &Connection,
    built: Built,
    context: &str,
    map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>, ServiceError> {
    let (sql, values) = built;
    let mut stmt = conn.prepare(&sql).map_err(ServiceError::from_db(context))?;
    stmt.query_map(rusqlite::params_from_iter(sq_params(&values)), map)
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<T>>>())
        .map_err(ServiceError::from_db(context))
}

/// True for UNIQUE / PRIMARY KEY / CHECK violations.
pub fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
