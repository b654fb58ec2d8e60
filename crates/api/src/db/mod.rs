//! Database schema, migrations, and sea-query builders.
//!
//! Every builder returns [`Built`]: the SQL text plus its positional values.
//! Column order of each `SELECT` is documented on the builder and matched by
//! the row mappers in the server.

pub mod forms;
pub mod invitations;
pub mod migrations;
pub mod responses;
pub mod tables;
pub mod templates;
pub mod users;
pub mod workspaces;

// Re-export tables for convenience
pub use tables::*;

pub type Built = (String, sea_query::Values);
