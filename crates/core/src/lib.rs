//! Framework-free domain model for Tinta forms.
//!
//! Nothing in here touches the database or HTTP; the server crate composes
//! these pieces with storage and transport.

pub mod blob;
pub mod schema;
pub mod slug;
pub mod upload;
pub mod validate;

pub use schema::{FieldDescriptor, FieldKind, FieldSchema, SchemaError};
pub use validate::{validate_submission, ValidationError};

#[cfg(any(test, feature = "testing"))]
pub mod testing;
