//! MCP service implementation using rmcp.
//!
//! This module defines the DbService struct exposing the schema tools via the
//! MCP protocol using the rmcp framework's macros. Every tool delegates to the
//! [`ToolRegistry`], so the names and behavior seen by clients are the
//! registry's.

use crate::tools::registry::{
    EXECUTE_SQL, GET_TABLE_DEPENDENCIES, GET_TABLE_REFERENCED_BY, GET_TABLE_SCHEMA, SQL_QUERY_ARG,
    TABLE_NAME_ARG,
};
use crate::tools::{SqlQueryInput, TableNameInput, ToolArgs, ToolRegistry};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct DbService {
    /// Shared tool table; owns the schema service and its pool
    registry: Arc<ToolRegistry>,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl DbService {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            tool_router: Self::tool_router(),
        }
    }

    async fn dispatch(&self, name: &str, args: ToolArgs) -> Result<CallToolResult, McpError> {
        let text = self.registry.call(name, &args).await?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

#[tool_router]
impl DbService {
    #[tool(
        name = "getTableSchema",
        description = "Get the schema (columns and types) of a specific table."
    )]
    async fn get_table_schema(
        &self,
        Parameters(input): Parameters<TableNameInput>,
    ) -> Result<CallToolResult, McpError> {
        let args = ToolArgs::new().with(TABLE_NAME_ARG, input.table_name);
        self.dispatch(GET_TABLE_SCHEMA, args).await
    }

    #[tool(
        name = "getTableDependencies",
        description = "Get foreign key constraints for a specific table (tables it references)."
    )]
    async fn get_table_dependencies(
        &self,
        Parameters(input): Parameters<TableNameInput>,
    ) -> Result<CallToolResult, McpError> {
        let args = ToolArgs::new().with(TABLE_NAME_ARG, input.table_name);
        self.dispatch(GET_TABLE_DEPENDENCIES, args).await
    }

    #[tool(
        name = "getTableReferencedBy",
        description = "Get tables that have foreign key constraints referencing a specific table (incoming dependencies)."
    )]
    async fn get_table_referenced_by(
        &self,
        Parameters(input): Parameters<TableNameInput>,
    ) -> Result<CallToolResult, McpError> {
        let args = ToolArgs::new().with(TABLE_NAME_ARG, input.table_name);
        self.dispatch(GET_TABLE_REFERENCED_BY, args).await
    }

    #[tool(
        name = "executeSql",
        description = "Executes a given SQL SELECT query against the database. WARNING: Use with extreme caution."
    )]
    async fn execute_sql(
        &self,
        Parameters(input): Parameters<SqlQueryInput>,
    ) -> Result<CallToolResult, McpError> {
        let args = match input.sql_query {
            Some(sql) => ToolArgs::new().with(SQL_QUERY_ARG, sql),
            None => ToolArgs::new(),
        };
        self.dispatch(EXECUTE_SQL, args).await
    }
}

#[tool_handler]
impl ServerHandler for DbService {
    fn get_info(&self) -> ServerInfo {
        let service = self.registry.service();
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "schema-mcp-server".to_owned(),
                title: Some("Schema MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(format!(
                "Schema introspection tools for a {} database.\n\
                \n\
                All lookups are restricted to the `{}` schema.\n\
                \n\
                ## Tools\n\
                - `getTableSchema(tableName)`: columns and declared types, in ordinal order\n\
                - `getTableDependencies(tableName)`: foreign keys this table owns\n\
                - `getTableReferencedBy(tableName)`: foreign keys in other tables pointing here\n\
                - `executeSql(sqlQuery)`: a single read-only SELECT; anything else is refused\n\
                \n\
                Every tool answers with plain text, including when a table is missing or a \
                query fails.",
                service.pool().db_type(),
                service.schema()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SqlGuardMode;
    use crate::db::{DbPool, QueryExecutor};
    use crate::tools::SchemaService;
    use sqlx::SqlitePool;
    use std::time::Duration;
    use tracing::Span;

    fn create_test_service() -> DbService {
        let pool = DbPool::SQLite(SqlitePool::connect_lazy("sqlite::memory:").unwrap());
        let service = SchemaService::new(
            pool,
            QueryExecutor::new(Duration::from_secs(5)),
            "main",
            SqlGuardMode::Denylist,
            Span::none(),
        );
        DbService::new(Arc::new(ToolRegistry::new(Arc::new(service))))
    }

    #[tokio::test]
    async fn test_router_matches_registry() {
        let service = create_test_service();
        let mut routed: Vec<(String, String)> = service
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| {
                (
                    t.name.to_string(),
                    t.description.map(|d| d.to_string()).unwrap_or_default(),
                )
            })
            .collect();
        routed.sort();

        let mut registered: Vec<(String, String)> = service
            .registry
            .definitions()
            .iter()
            .map(|t| (t.name.to_string(), t.description.to_string()))
            .collect();
        registered.sort();

        assert_eq!(routed, registered);
    }

    #[tokio::test]
    async fn test_server_info() {
        let service = create_test_service();
        let info = service.get_info();
        assert_eq!(info.server_info.name, "schema-mcp-server");
        assert!(info.capabilities.tools.is_some());
        let instructions = info.instructions.unwrap();
        assert!(instructions.contains("`main` schema"));
        assert!(instructions.contains("SQLite"));
    }

    #[tokio::test]
    async fn test_dispatch_wraps_text() {
        let service = create_test_service();
        let result = service
            .dispatch(EXECUTE_SQL, ToolArgs::new().with(SQL_QUERY_ARG, "DELETE FROM t"))
            .await
            .unwrap();
        assert_eq!(result.content.len(), 1);
        let text = result.content[0].as_text().unwrap();
        assert_eq!(
            text.text,
            "Error: Only SELECT queries are allowed by this tool for safety."
        );
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool_is_invalid_params() {
        let service = create_test_service();
        let err = service.dispatch("nope", ToolArgs::new()).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
