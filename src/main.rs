//! Schema MCP Server - Main entry point.
//!
//! This server provides MCP (Model Context Protocol) tools for AI assistants
//! to inspect a database schema and run read-only queries against it.

use schema_mcp_server::config::{Config, TransportMode};
use schema_mcp_server::db::{DbPool, QueryExecutor};
use schema_mcp_server::models::ConnectionConfig;
use schema_mcp_server::tools::{SchemaService, ToolRegistry};
use schema_mcp_server::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info, info_span};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; stdout carries the stdio transport.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse_args();
    init_tracing(&config);

    info!(
        transport = %config.transport,
        sql_guard = %config.sql_guard,
        "Starting Schema MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let db_config = config.parse_database().inspect_err(|e| {
        error!(error = %e, "Invalid database configuration");
    })?;
    let conn_config = ConnectionConfig::new(
        db_config.connection_string,
        config.schema.clone(),
        db_config.database,
        db_config.pool_options,
    )
    .inspect_err(|e| error!(error = %e, "Invalid database configuration"))?;

    let pool = DbPool::connect(&conn_config, config.connect_timeout)
        .await
        .inspect_err(|e| error!(error = %e, suggestion = ?e.suggestion(), "Database connection failed"))?;

    let span = info_span!(
        "schema_service",
        db_type = %conn_config.db_type,
        schema = %conn_config.schema
    );
    let service = SchemaService::new(
        pool,
        QueryExecutor::new(config.query_timeout_duration()),
        conn_config.schema.clone(),
        config.sql_guard,
        span,
    );
    let registry = Arc::new(ToolRegistry::new(Arc::new(service)));
    info!(
        tools = ?registry.definitions().iter().map(|t| t.name).collect::<Vec<_>>(),
        "Registered tools"
    );

    let result = match config.transport {
        TransportMode::Stdio => StdioTransport::new(registry).run().await,
        TransportMode::Http => {
            info!(
                host = %config.http_host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            HttpTransport::new(
                registry,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            )
            .run()
            .await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
