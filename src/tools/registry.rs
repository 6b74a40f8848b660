//! Explicit tool table.
//!
//! Tools are registered by hand, in a fixed order, at startup. Each entry
//! pairs a public name and description with a plain function that forwards
//! to [`SchemaService`].

use crate::error::{DbError, DbResult};
use crate::tools::schema::SchemaService;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;

pub const GET_TABLE_SCHEMA: &str = "getTableSchema";
pub const GET_TABLE_DEPENDENCIES: &str = "getTableDependencies";
pub const GET_TABLE_REFERENCED_BY: &str = "getTableReferencedBy";
pub const EXECUTE_SQL: &str = "executeSql";

pub const TABLE_NAME_ARG: &str = "tableName";
pub const SQL_QUERY_ARG: &str = "sqlQuery";

/// String-keyed arguments for a single call.
#[derive(Debug, Clone, Default)]
pub struct ToolArgs(HashMap<String, String>);

impl ToolArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

pub type ToolHandler = for<'a> fn(&'a SchemaService, &'a ToolArgs) -> BoxFuture<'a, String>;

#[derive(Clone)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    /// The single argument the tool reads
    pub argument: &'static str,
    handler: ToolHandler,
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("argument", &self.argument)
            .finish_non_exhaustive()
    }
}

// A missing tableName is looked up as "", a missing sqlQuery is rejected as empty.
fn table_name(args: &ToolArgs) -> &str {
    args.get(TABLE_NAME_ARG).unwrap_or_default()
}

fn get_table_schema<'a>(service: &'a SchemaService, args: &'a ToolArgs) -> BoxFuture<'a, String> {
    Box::pin(service.get_table_schema(table_name(args)))
}

fn get_table_dependencies<'a>(
    service: &'a SchemaService,
    args: &'a ToolArgs,
) -> BoxFuture<'a, String> {
    Box::pin(service.get_table_dependencies(table_name(args)))
}

fn get_table_referenced_by<'a>(
    service: &'a SchemaService,
    args: &'a ToolArgs,
) -> BoxFuture<'a, String> {
    Box::pin(service.get_table_referenced_by(table_name(args)))
}

fn execute_sql<'a>(service: &'a SchemaService, args: &'a ToolArgs) -> BoxFuture<'a, String> {
    Box::pin(service.execute_sql(args.get(SQL_QUERY_ARG)))
}

pub struct ToolRegistry {
    service: Arc<SchemaService>,
    tools: Vec<ToolDefinition>,
}

impl ToolRegistry {
    pub fn new(service: Arc<SchemaService>) -> Self {
        let tools = vec![
            ToolDefinition {
                name: GET_TABLE_SCHEMA,
                description: "Get the schema (columns and types) of a specific table.",
                argument: TABLE_NAME_ARG,
                handler: get_table_schema,
            },
            ToolDefinition {
                name: GET_TABLE_DEPENDENCIES,
                description: "Get foreign key constraints for a specific table (tables it references).",
                argument: TABLE_NAME_ARG,
                handler: get_table_dependencies,
            },
            ToolDefinition {
                name: GET_TABLE_REFERENCED_BY,
                description: "Get tables that have foreign key constraints referencing a specific table (incoming dependencies).",
                argument: TABLE_NAME_ARG,
                handler: get_table_referenced_by,
            },
            ToolDefinition {
                name: EXECUTE_SQL,
                description: "Executes a given SQL SELECT query against the database. WARNING: Use with extreme caution.",
                argument: SQL_QUERY_ARG,
                handler: execute_sql,
            },
        ];
        Self { service, tools }
    }

    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn service(&self) -> &SchemaService {
        &self.service
    }

    /// Invoke a tool by name.
    ///
    /// Only an unknown name is an error; every registered tool answers with text.
    pub async fn call(&self, name: &str, args: &ToolArgs) -> DbResult<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| DbError::tool_not_found(name))?;
        Ok((tool.handler)(&self.service, args).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SqlGuardMode;
    use crate::db::{DbPool, QueryExecutor};
    use sqlx::SqlitePool;
    use std::time::Duration;
    use tracing::Span;

    fn lazy_registry() -> ToolRegistry {
        let pool = DbPool::SQLite(SqlitePool::connect_lazy("sqlite::memory:").unwrap());
        let service = SchemaService::new(
            pool,
            QueryExecutor::new(Duration::from_secs(5)),
            "main",
            SqlGuardMode::Denylist,
            Span::none(),
        );
        ToolRegistry::new(Arc::new(service))
    }

    #[test]
    fn test_tools_listed_in_order() {
        let registry = tokio_test::block_on(async { lazy_registry() });
        let names: Vec<&str> = registry.definitions().iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "getTableSchema",
                "getTableDependencies",
                "getTableReferencedBy",
                "executeSql"
            ]
        );
    }

    #[test]
    fn test_arguments() {
        let registry = tokio_test::block_on(async { lazy_registry() });
        assert_eq!(registry.get(EXECUTE_SQL).unwrap().argument, "sqlQuery");
        assert_eq!(registry.get(GET_TABLE_SCHEMA).unwrap().argument, "tableName");
    }

    #[test]
    fn test_unknown_tool() {
        let registry = tokio_test::block_on(async { lazy_registry() });
        assert!(registry.get("dropTable").is_none());

        let err = tokio_test::block_on(registry.call("dropTable", &ToolArgs::new())).unwrap_err();
        assert_eq!(err.kind(), "ToolNotFoundError");
    }

    #[tokio::test]
    async fn test_missing_sql_query_is_empty() {
        let registry = lazy_registry();
        let out = registry.call(EXECUTE_SQL, &ToolArgs::new()).await.unwrap();
        assert_eq!(out, "Error: SQL query cannot be empty.");
    }

    #[test]
    fn test_tool_args() {
        let args = ToolArgs::new().with(TABLE_NAME_ARG, "users");
        assert_eq!(args.get("tableName"), Some("users"));
        assert_eq!(args.get("sqlQuery"), None);
    }
}
