//! MCP tool implementations.
//!
//! This module contains the schema tools and their plumbing:
//! - `schema`: the four operations (`getTableSchema`, `getTableDependencies`,
//!   `getTableReferencedBy`, `executeSql`)
//! - `registry`: name to handler table used by the MCP adapter
//! - `sql_guard`: read-only validation for `executeSql`
//! - `format`: text rendering of every response

pub mod format;
pub mod registry;
pub mod schema;
pub mod sql_guard;

pub use registry::{ToolArgs, ToolDefinition, ToolRegistry};
pub use schema::{SchemaService, SqlQueryInput, TableNameInput};
pub use sql_guard::{Rejection, SqlGuard};
