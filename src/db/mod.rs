//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Read-only connection pool
//! - Query execution with timeouts and read-only transactions
//! - Catalog introspection
//! - Row rendering

pub mod catalog;
pub mod executor;
pub mod pool;
pub mod types;

pub use catalog::{CatalogQueries, SchemaInspector};
pub use executor::QueryExecutor;
pub use pool::DbPool;
pub use types::RowToText;
