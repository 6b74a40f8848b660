//! Schema introspection tools.
//!
//! This module implements the four operations behind `getTableSchema`,
//! `getTableDependencies`, `getTableReferencedBy` and `executeSql`. Every
//! operation returns a `String`: lookups that find nothing, rejected queries
//! and database faults are all reported as text.

use crate::config::SqlGuardMode;
use crate::db::{DbPool, QueryExecutor, SchemaInspector};
use crate::tools::format::{
    format_dependencies, format_referenced_by, format_result_set, format_table_schema,
};
use crate::tools::sql_guard::SqlGuard;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{Instrument, Span, debug, error, warn};

/// Input for the table lookups.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct TableNameInput {
    /// Name of the table in the configured schema
    #[serde(rename = "tableName", default)]
    pub table_name: String,
}

/// Input for `executeSql`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct SqlQueryInput {
    /// A single SELECT query
    #[serde(rename = "sqlQuery", default)]
    pub sql_query: Option<String>,
}

pub struct SchemaService {
    pool: DbPool,
    executor: QueryExecutor,
    schema: String,
    guard: SqlGuard,
    span: Span,
}

impl SchemaService {
    /// Create the service over an open pool.
    ///
    /// # Arguments
    ///
    /// * `pool` - Read-only pool for the configured database
    /// * `executor` - Executor carrying the query timeout
    /// * `schema` - Schema every catalog lookup is restricted to
    /// * `guard_mode` - How strictly `executeSql` validates its input
    /// * `span` - Span every operation is recorded under
    pub fn new(
        pool: DbPool,
        executor: QueryExecutor,
        schema: impl Into<String>,
        guard_mode: SqlGuardMode,
        span: Span,
    ) -> Self {
        let guard = SqlGuard::new(guard_mode, pool.db_type());
        Self {
            pool,
            executor,
            schema: schema.into(),
            guard,
            span,
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn get_table_schema(&self, table_name: &str) -> String {
        async {
            debug!(table = %table_name, "Getting schema for table");
            match SchemaInspector::columns(&self.executor, &self.pool, &self.schema, table_name)
                .await
            {
                Ok(columns) => format_table_schema(table_name, &self.schema, &columns),
                Err(e) => {
                    error!(table = %table_name, error = %e, "Error fetching schema");
                    format!(
                        "Error fetching schema for table '{}': {}",
                        table_name,
                        e.detail()
                    )
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }

    pub async fn get_table_dependencies(&self, table_name: &str) -> String {
        async {
            debug!(table = %table_name, "Getting dependencies for table");
            match SchemaInspector::outgoing_foreign_keys(
                &self.executor,
                &self.pool,
                &self.schema,
                table_name,
            )
            .await
            {
                Ok(edges) => format_dependencies(table_name, &self.schema, &edges),
                Err(e) => {
                    error!(table = %table_name, error = %e, "Error fetching dependencies");
                    format!(
                        "Error fetching dependencies for table '{}': {}",
                        table_name,
                        e.detail()
                    )
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }

    pub async fn get_table_referenced_by(&self, table_name: &str) -> String {
        async {
            debug!(table = %table_name, "Getting tables referencing table");
            match SchemaInspector::incoming_foreign_keys(
                &self.executor,
                &self.pool,
                &self.schema,
                table_name,
            )
            .await
            {
                Ok(edges) => format_referenced_by(table_name, &self.schema, &edges),
                Err(e) => {
                    error!(table = %table_name, error = %e, "Error fetching references");
                    format!(
                        "Error fetching references for table '{}': {}",
                        table_name,
                        e.detail()
                    )
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }

    /// Validate and run an ad-hoc query.
    ///
    /// Rejected queries never reach the database. Accepted ones run inside a
    /// read-only transaction that is rolled back afterwards.
    pub async fn execute_sql(&self, sql_query: Option<&str>) -> String {
        async {
            warn!(
                query = sql_query.unwrap_or_default(),
                "Executing potentially arbitrary SQL query"
            );

            let sql = match self.guard.check(sql_query) {
                Ok(sql) => sql,
                Err(rejection) => {
                    error!(
                        query = sql_query.unwrap_or_default(),
                        guard = %self.guard.mode(),
                        reason = ?rejection,
                        "executeSql rejected query"
                    );
                    return rejection.to_string();
                }
            };

            match self.executor.fetch_read_only(&self.pool, sql).await {
                Ok(rs) => format_result_set(&rs),
                Err(e) => {
                    error!(query = %sql, error = %e, kind = e.kind(), "Error executing SQL query");
                    format!("Error executing query: {} (Type: {})", e.detail(), e.kind())
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }
}
