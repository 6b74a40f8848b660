//! Schema MCP Server Library
//!
//! This library provides MCP (Model Context Protocol) tools that let AI
//! assistants inspect a SQL database's tables and foreign keys and run
//! read-only queries (PostgreSQL, MySQL, SQLite).

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::DbError;
pub use mcp::DbService;
pub use tools::{SchemaService, ToolRegistry};
