//! Query execution engine.
//!
//! This module provides two kinds of fetch, both bounded by the query timeout:
//! - parameterized catalog lookups (`fetch_with_params`)
//! - ad-hoc queries inside a read-only transaction that is always rolled back
//!   (`fetch_read_only`)
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `mysql`: MySQL-specific fetches
//! - `postgres`: PostgreSQL-specific fetches
//! - `sqlite`: SQLite-specific fetches
//!
//! Each submodule provides identical functionality adapted to the database's
//! placeholder style and transaction syntax.

use crate::db::pool::DbPool;
use crate::db::types::RowToText;
use crate::error::{DbError, DbResult};
use crate::models::QueryResultSet;
use futures_util::TryStreamExt;
use futures_util::stream::BoxStream;
use sqlx::Either;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

/// Query executor that handles database query execution.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    query_timeout: Duration,
}

impl QueryExecutor {
    /// Create a new query executor.
    pub fn new(query_timeout: Duration) -> Self {
        Self { query_timeout }
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Run a catalog query with string parameters bound in order.
    pub async fn fetch_with_params(
        &self,
        pool: &DbPool,
        sql: &str,
        params: &[&str],
    ) -> DbResult<QueryResultSet> {
        let start = Instant::now();
        let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();

        let result = match pool {
            DbPool::MySql(p) => {
                into_result_set(mysql::fetch_with_params(p, sql, params, self.query_timeout).await?)
            }
            DbPool::Postgres(p) => into_result_set(
                postgres::fetch_with_params(p, sql, params, self.query_timeout).await?,
            ),
            DbPool::SQLite(p) => {
                into_result_set(sqlite::fetch_with_params(p, sql, params, self.query_timeout).await?)
            }
        };

        debug!(
            rows = result.row_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Catalog query finished"
        );
        Ok(result)
    }

    /// Run an ad-hoc query inside a read-only transaction.
    ///
    /// The transaction is rolled back whether the query succeeds or not, so
    /// nothing it does can persist. A multi-statement query runs to the end,
    /// but only the first statement's rows are returned.
    pub async fn fetch_read_only(&self, pool: &DbPool, sql: &str) -> DbResult<QueryResultSet> {
        let start = Instant::now();

        let result = match pool {
            DbPool::MySql(p) => {
                into_result_set(mysql::fetch_read_only(p, sql, self.query_timeout).await?)
            }
            DbPool::Postgres(p) => {
                into_result_set(postgres::fetch_read_only(p, sql, self.query_timeout).await?)
            }
            DbPool::SQLite(p) => {
                into_result_set(sqlite::fetch_read_only(p, sql, self.query_timeout).await?)
            }
        };

        debug!(
            rows = result.row_count(),
            columns = result.columns.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Read-only query finished"
        );
        Ok(result)
    }
}

/// Render rows from any database type into a QueryResultSet.
fn into_result_set<R: RowToText>(rows: Vec<R>) -> QueryResultSet {
    let columns = rows.first().map(|r| r.column_names()).unwrap_or_default();
    let rows = rows.iter().map(|r| r.to_text_values()).collect();
    QueryResultSet::new(columns, rows)
}

// =============================================================================
// Common Helper Functions
// =============================================================================

fn timeout_error(operation: &str, timeout: Duration) -> DbError {
    DbError::timeout(operation, timeout.as_secs() as u32)
}

/// Drain a `fetch_many` stream, keeping only the rows of the first statement.
///
/// Later statements still run so that their errors are reported.
async fn first_result_set<Q, R>(
    mut results: BoxStream<'_, Result<Either<Q, R>, sqlx::Error>>,
) -> Result<Vec<R>, sqlx::Error> {
    let mut rows = Vec::new();
    let mut first_done = false;
    while let Some(item) = results.try_next().await? {
        match item {
            Either::Left(_) => first_done = true,
            Either::Right(row) if !first_done => rows.push(row),
            Either::Right(_) => {}
        }
    }
    Ok(rows)
}

/// Flatten a timed-out or failed fetch into a `DbResult`.
fn settle<T>(
    outcome: Result<Result<T, sqlx::Error>, tokio::time::error::Elapsed>,
    operation: &str,
    query_timeout: Duration,
) -> DbResult<T> {
    match outcome {
        Ok(result) => result.map_err(DbError::from),
        Err(_) => Err(timeout_error(operation, query_timeout)),
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database type.
// The code structure is intentionally parallel to make differences obvious.

mod mysql {
    use super::*;
    use sqlx::mysql::MySqlRow;
    use sqlx::{Connection, Executor, MySqlPool};

    pub async fn fetch_with_params(
        pool: &MySqlPool,
        sql: &str,
        params: Vec<String>,
        query_timeout: Duration,
    ) -> DbResult<Vec<MySqlRow>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(param);
        }
        settle(
            timeout(query_timeout, query.fetch_all(pool)).await,
            "catalog query",
            query_timeout,
        )
    }

    pub async fn fetch_read_only(
        pool: &MySqlPool,
        sql: &str,
        query_timeout: Duration,
    ) -> DbResult<Vec<MySqlRow>> {
        let work = async {
            let mut conn = pool.acquire().await?;
            // Applies to the next transaction started on this connection only
            (&mut *conn).execute("SET TRANSACTION READ ONLY").await?;
            let mut tx = Connection::begin(&mut *conn).await?;
            let rows = first_result_set((&mut *tx).fetch_many(sql)).await;
            let rollback = tx.rollback().await;
            let rows = rows?;
            rollback?;
            Ok::<_, sqlx::Error>(rows)
        };
        settle(
            timeout(query_timeout, work).await,
            "query execution",
            query_timeout,
        )
    }
}

mod postgres {
    use super::*;
    use sqlx::postgres::PgRow;
    use sqlx::{Executor, PgPool};

    pub async fn fetch_with_params(
        pool: &PgPool,
        sql: &str,
        params: Vec<String>,
        query_timeout: Duration,
    ) -> DbResult<Vec<PgRow>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(param);
        }
        settle(
            timeout(query_timeout, query.fetch_all(pool)).await,
            "catalog query",
            query_timeout,
        )
    }

    pub async fn fetch_read_only(
        pool: &PgPool,
        sql: &str,
        query_timeout: Duration,
    ) -> DbResult<Vec<PgRow>> {
        let work = async {
            let mut tx = pool.begin().await?;
            (&mut *tx).execute("SET TRANSACTION READ ONLY").await?;
            let rows = first_result_set((&mut *tx).fetch_many(sql)).await;
            let rollback = tx.rollback().await;
            let rows = rows?;
            rollback?;
            Ok::<_, sqlx::Error>(rows)
        };
        settle(
            timeout(query_timeout, work).await,
            "query execution",
            query_timeout,
        )
    }
}

mod sqlite {
    use super::*;
    use sqlx::sqlite::SqliteRow;
    use sqlx::{Executor, SqlitePool};

    pub async fn fetch_with_params(
        pool: &SqlitePool,
        sql: &str,
        params: Vec<String>,
        query_timeout: Duration,
    ) -> DbResult<Vec<SqliteRow>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(param);
        }
        settle(
            timeout(query_timeout, query.fetch_all(pool)).await,
            "catalog query",
            query_timeout,
        )
    }

    /// SQLite has no read-only transaction mode; the pool itself opens the
    /// file read-only.
    pub async fn fetch_read_only(
        pool: &SqlitePool,
        sql: &str,
        query_timeout: Duration,
    ) -> DbResult<Vec<SqliteRow>> {
        let work = async {
            let mut tx = pool.begin().await?;
            let rows = first_result_set((&mut *tx).fetch_many(sql)).await;
            let rollback = tx.rollback().await;
            let rows = rows?;
            rollback?;
            Ok::<_, sqlx::Error>(rows)
        };
        settle(
            timeout(query_timeout, work).await,
            "query execution",
            query_timeout,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    async fn memory_pool() -> DbPool {
        DbPool::SQLite(SqlitePool::connect("sqlite::memory:").await.unwrap())
    }

    #[test]
    fn test_executor_timeout() {
        let executor = QueryExecutor::new(Duration::from_secs(45));
        assert_eq!(executor.query_timeout(), Duration::from_secs(45));
    }

    #[tokio::test]
    async fn test_fetch_read_only_preserves_column_order() {
        let pool = memory_pool().await;
        let executor = QueryExecutor::new(Duration::from_secs(5));

        let rs = executor
            .fetch_read_only(&pool, "SELECT 2 AS zeta, NULL AS alpha, 'x' AS mid")
            .await
            .unwrap();

        assert_eq!(rs.columns, vec!["zeta", "alpha", "mid"]);
        assert_eq!(
            rs.rows,
            vec![vec![Some("2".to_string()), None, Some("x".to_string())]]
        );
    }

    #[tokio::test]
    async fn test_fetch_with_params_binds_in_order() {
        let pool = memory_pool().await;
        let executor = QueryExecutor::new(Duration::from_secs(5));

        let rs = executor
            .fetch_with_params(&pool, "SELECT ?1 AS first, ?2 AS second", &["a", "b"])
            .await
            .unwrap();

        assert_eq!(rs.text(0, "first"), Some("a"));
        assert_eq!(rs.text(0, "second"), Some("b"));
    }

    #[tokio::test]
    async fn test_fetch_read_only_reports_database_error() {
        let pool = memory_pool().await;
        let executor = QueryExecutor::new(Duration::from_secs(5));

        let err = executor
            .fetch_read_only(&pool, "SELECT * FROM no_such_table")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "DatabaseError");
        assert!(err.detail().contains("no_such_table"));
    }

    #[tokio::test]
    async fn test_settle_reports_timeout() {
        let outcome = timeout(
            Duration::from_millis(1),
            std::future::pending::<Result<(), sqlx::Error>>(),
        )
        .await;
        let err = settle(outcome, "query execution", Duration::from_secs(3)).unwrap_err();
        assert_eq!(err.kind(), "TimeoutError");
    }

    #[tokio::test]
    async fn test_empty_result_has_no_columns() {
        let pool = memory_pool().await;
        let executor = QueryExecutor::new(Duration::from_secs(5));

        let rs = executor
            .fetch_read_only(&pool, "SELECT 1 WHERE 1 = 0")
            .await
            .unwrap();
        assert!(rs.is_empty());
        assert!(rs.columns.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_read_only_keeps_first_statement_only() {
        let pool = memory_pool().await;
        let executor = QueryExecutor::new(Duration::from_secs(5));

        let rs = executor
            .fetch_read_only(&pool, "SELECT 1 AS a; SELECT 2 AS b, 3 AS c")
            .await
            .unwrap();
        assert_eq!(rs.columns, vec!["a"]);
        assert_eq!(rs.rows, vec![vec![Some("1".to_string())]]);

        let rs = executor
            .fetch_read_only(&pool, "SELECT 1 AS a WHERE 1 = 0; SELECT 2 AS b")
            .await
            .unwrap();
        assert!(rs.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_read_only_reports_error_in_later_statement() {
        let pool = memory_pool().await;
        let executor = QueryExecutor::new(Duration::from_secs(5));

        let err = executor
            .fetch_read_only(&pool, "SELECT 1 AS a; SELECT * FROM no_such_table")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "DatabaseError");
    }
}
