//! Catalog introspection module.
//!
//! This module looks up columns and foreign-key relationships of one table in
//! the configured schema, for PostgreSQL, MySQL and SQLite.
//!
//! # Architecture
//!
//! SQL queries are organized in the `queries` submodule with constants for each
//! database type. Every query takes exactly two bound parameters, always in the
//! order (schema, table), and aliases its output columns to the same names so
//! a single mapping turns any dialect's rows into models. The table name never
//! reaches the SQL text.

use crate::db::executor::QueryExecutor;
use crate::db::pool::DbPool;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnDescriptor, DatabaseType, ForeignKeyEdge, QueryResultSet};
use tracing::debug;

/// Schema inspector for catalog introspection.
pub struct SchemaInspector;

impl SchemaInspector {
    /// Columns of `table` in ordinal order. Empty when the table does not exist.
    pub async fn columns(
        executor: &QueryExecutor,
        pool: &DbPool,
        schema: &str,
        table: &str,
    ) -> DbResult<Vec<ColumnDescriptor>> {
        let sql = CatalogQueries::for_db(pool.db_type()).columns;
        debug!(schema = %schema, table = %table, "Fetching columns");

        let rs = executor.fetch_with_params(pool, sql, &[schema, table]).await?;
        (0..rs.row_count())
            .map(|row| {
                Ok(ColumnDescriptor::new(
                    required(&rs, row, "column_name")?,
                    // SQLite allows columns without a declared type
                    rs.text(row, "data_type").unwrap_or_default(),
                ))
            })
            .collect()
    }

    /// Foreign keys owned by `table`, joined to the columns they reference.
    pub async fn outgoing_foreign_keys(
        executor: &QueryExecutor,
        pool: &DbPool,
        schema: &str,
        table: &str,
    ) -> DbResult<Vec<ForeignKeyEdge>> {
        let sql = CatalogQueries::for_db(pool.db_type()).outgoing_foreign_keys;
        debug!(schema = %schema, table = %table, "Fetching outgoing foreign keys");

        let rs = executor.fetch_with_params(pool, sql, &[schema, table]).await?;
        edges(&rs)
    }

    /// Foreign keys of any table in the schema that reference `table`.
    pub async fn incoming_foreign_keys(
        executor: &QueryExecutor,
        pool: &DbPool,
        schema: &str,
        table: &str,
    ) -> DbResult<Vec<ForeignKeyEdge>> {
        let sql = CatalogQueries::for_db(pool.db_type()).incoming_foreign_keys;
        debug!(schema = %schema, table = %table, "Fetching incoming foreign keys");

        let rs = executor.fetch_with_params(pool, sql, &[schema, table]).await?;
        edges(&rs)
    }
}

fn edges(rs: &QueryResultSet) -> DbResult<Vec<ForeignKeyEdge>> {
    (0..rs.row_count())
        .map(|row| {
            Ok(ForeignKeyEdge::new(
                required(rs, row, "table_name")?,
                required(rs, row, "column_name")?,
                required(rs, row, "foreign_table_name")?,
                required(rs, row, "foreign_column_name")?,
            ))
        })
        .collect()
}

fn required(rs: &QueryResultSet, row: usize, column: &str) -> DbResult<String> {
    rs.text(row, column)
        .map(String::from)
        .ok_or_else(|| DbError::schema(format!("Catalog row has no {}", column), column))
}

/// The three catalog lookups of one dialect.
#[derive(Debug, Clone, Copy)]
pub struct CatalogQueries {
    pub columns: &'static str,
    pub outgoing_foreign_keys: &'static str,
    pub incoming_foreign_keys: &'static str,
}

impl CatalogQueries {
    pub fn for_db(db_type: DatabaseType) -> &'static CatalogQueries {
        match db_type {
            DatabaseType::PostgreSQL => &queries::postgres::CATALOG,
            DatabaseType::MySQL => &queries::mysql::CATALOG,
            DatabaseType::SQLite => &queries::sqlite::CATALOG,
        }
    }
}

// =============================================================================
// SQL Query Templates
// =============================================================================
//
// Centralized SQL queries for catalog introspection. Each database has its own
// submodule with queries adapted to its specific system catalogs.

mod queries {
    pub mod postgres {
        use super::super::CatalogQueries;

        // information_schema uses domain types (sql_identifier, character_data);
        // the casts keep every output column plain text.
        pub const COLUMNS: &str = r#"
            SELECT
                column_name::text AS column_name,
                data_type::text AS data_type
            FROM information_schema.columns
            WHERE table_schema = $1
            AND table_name = $2
            ORDER BY ordinal_position
            "#;

        pub const OUTGOING_FOREIGN_KEYS: &str = r#"
            SELECT
                tc.table_name::text AS table_name,
                kcu.column_name::text AS column_name,
                ccu.table_name::text AS foreign_table_name,
                ccu.column_name::text AS foreign_column_name
            FROM information_schema.table_constraints AS tc
            JOIN information_schema.key_column_usage AS kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage AS ccu
                ON ccu.constraint_name = tc.constraint_name
                AND ccu.table_schema = tc.table_schema
            WHERE tc.constraint_type = 'FOREIGN KEY'
            AND tc.table_schema = $1
            AND tc.table_name = $2
            "#;

        pub const INCOMING_FOREIGN_KEYS: &str = r#"
            SELECT
                tc.table_name::text AS table_name,
                kcu.column_name::text AS column_name,
                ccu.table_name::text AS foreign_table_name,
                ccu.column_name::text AS foreign_column_name
            FROM information_schema.table_constraints AS tc
            JOIN information_schema.key_column_usage AS kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage AS ccu
                ON ccu.constraint_name = tc.constraint_name
                AND ccu.table_schema = tc.table_schema
            WHERE tc.constraint_type = 'FOREIGN KEY'
            AND tc.table_schema = $1
            AND ccu.table_name = $2
            "#;

        pub static CATALOG: CatalogQueries = CatalogQueries {
            columns: COLUMNS,
            outgoing_foreign_keys: OUTGOING_FOREIGN_KEYS,
            incoming_foreign_keys: INCOMING_FOREIGN_KEYS,
        };
    }

    pub mod mysql {
        use super::super::CatalogQueries;

        // Some MySQL versions report information_schema columns as binary
        // strings; CONVERT forces a text result.
        pub const COLUMNS: &str = r#"
            SELECT
                CONVERT(COLUMN_NAME USING utf8mb4) AS column_name,
                CONVERT(DATA_TYPE USING utf8mb4) AS data_type
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = ?
            AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
            "#;

        pub const OUTGOING_FOREIGN_KEYS: &str = r#"
            SELECT
                CONVERT(kcu.TABLE_NAME USING utf8mb4) AS table_name,
                CONVERT(kcu.COLUMN_NAME USING utf8mb4) AS column_name,
                CONVERT(kcu.REFERENCED_TABLE_NAME USING utf8mb4) AS foreign_table_name,
                CONVERT(kcu.REFERENCED_COLUMN_NAME USING utf8mb4) AS foreign_column_name
            FROM information_schema.TABLE_CONSTRAINTS tc
            JOIN information_schema.KEY_COLUMN_USAGE kcu
                ON tc.CONSTRAINT_SCHEMA = kcu.CONSTRAINT_SCHEMA
                AND tc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME
                AND tc.TABLE_NAME = kcu.TABLE_NAME
            WHERE tc.CONSTRAINT_TYPE = 'FOREIGN KEY'
            AND tc.TABLE_SCHEMA = ?
            AND tc.TABLE_NAME = ?
            ORDER BY kcu.CONSTRAINT_NAME, kcu.ORDINAL_POSITION
            "#;

        pub const INCOMING_FOREIGN_KEYS: &str = r#"
            SELECT
                CONVERT(kcu.TABLE_NAME USING utf8mb4) AS table_name,
                CONVERT(kcu.COLUMN_NAME USING utf8mb4) AS column_name,
                CONVERT(kcu.REFERENCED_TABLE_NAME USING utf8mb4) AS foreign_table_name,
                CONVERT(kcu.REFERENCED_COLUMN_NAME USING utf8mb4) AS foreign_column_name
            FROM information_schema.TABLE_CONSTRAINTS tc
            JOIN information_schema.KEY_COLUMN_USAGE kcu
                ON tc.CONSTRAINT_SCHEMA = kcu.CONSTRAINT_SCHEMA
                AND tc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME
                AND tc.TABLE_NAME = kcu.TABLE_NAME
            WHERE tc.CONSTRAINT_TYPE = 'FOREIGN KEY'
            AND tc.TABLE_SCHEMA = ?
            AND kcu.REFERENCED_TABLE_NAME = ?
            ORDER BY kcu.TABLE_NAME, kcu.CONSTRAINT_NAME, kcu.ORDINAL_POSITION
            "#;

        pub static CATALOG: CatalogQueries = CatalogQueries {
            columns: COLUMNS,
            outgoing_foreign_keys: OUTGOING_FOREIGN_KEYS,
            incoming_foreign_keys: INCOMING_FOREIGN_KEYS,
        };
    }

    pub mod sqlite {
        use super::super::CatalogQueries;

        // Pragma table-valued functions take (argument, schema). ?1 is the
        // schema and ?2 the table.
        pub const COLUMNS: &str = r#"
            SELECT
                name AS column_name,
                type AS data_type
            FROM pragma_table_info(?2, ?1)
            ORDER BY cid
            "#;

        // A REFERENCES clause without a column list targets the parent's
        // primary key, and "to" is NULL in that case.
        pub const OUTGOING_FOREIGN_KEYS: &str = r#"
            SELECT
                ?2 AS table_name,
                fk."from" AS column_name,
                fk."table" AS foreign_table_name,
                COALESCE(
                    fk."to",
                    (SELECT p.name FROM pragma_table_info(fk."table", ?1) AS p
                     WHERE p.pk = fk.seq + 1)
                ) AS foreign_column_name
            FROM pragma_foreign_key_list(?2, ?1) AS fk
            ORDER BY fk.id, fk.seq
            "#;

        pub const INCOMING_FOREIGN_KEYS: &str = r#"
            SELECT
                t.name AS table_name,
                fk."from" AS column_name,
                fk."table" AS foreign_table_name,
                COALESCE(
                    fk."to",
                    (SELECT p.name FROM pragma_table_info(fk."table", ?1) AS p
                     WHERE p.pk = fk.seq + 1)
                ) AS foreign_column_name
            FROM pragma_table_list AS t
            JOIN pragma_foreign_key_list(t.name, ?1) AS fk
            WHERE t.schema = ?1
            AND t.type = 'table'
            AND t.name NOT LIKE 'sqlite_%'
            AND fk."table" = ?2 COLLATE NOCASE
            ORDER BY t.name, fk.id, fk.seq
            "#;

        pub static CATALOG: CatalogQueries = CatalogQueries {
            columns: COLUMNS,
            outgoing_foreign_keys: OUTGOING_FOREIGN_KEYS,
            incoming_foreign_keys: INCOMING_FOREIGN_KEYS,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_query_binds_schema_then_table() {
        for db in [
            DatabaseType::PostgreSQL,
            DatabaseType::MySQL,
            DatabaseType::SQLite,
        ] {
            let q = CatalogQueries::for_db(db);
            for sql in [q.columns, q.outgoing_foreign_keys, q.incoming_foreign_keys] {
                match db {
                    DatabaseType::PostgreSQL => {
                        assert!(sql.contains("$1") && sql.contains("$2"));
                        assert!(!sql.contains("$3"));
                    }
                    DatabaseType::MySQL => assert_eq!(sql.matches('?').count(), 2),
                    DatabaseType::SQLite => {
                        assert!(sql.contains("?1") && sql.contains("?2"));
                        assert!(!sql.contains("?3"));
                    }
                }
            }
        }
    }

    #[test]
    fn test_foreign_key_queries_share_output_columns() {
        for db in [
            DatabaseType::PostgreSQL,
            DatabaseType::MySQL,
            DatabaseType::SQLite,
        ] {
            let q = CatalogQueries::for_db(db);
            for sql in [q.outgoing_foreign_keys, q.incoming_foreign_keys] {
                for alias in [
                    "AS table_name",
                    "AS column_name",
                    "AS foreign_table_name",
                    "AS foreign_column_name",
                ] {
                    assert!(sql.contains(alias), "{db}: missing {alias}");
                }
            }
        }
    }

    #[test]
    fn test_postgres_columns_ordered_by_ordinal_position() {
        assert!(queries::postgres::COLUMNS.contains("ORDER BY ordinal_position"));
    }

    #[test]
    fn test_required_reports_missing_catalog_value() {
        let rs = QueryResultSet::new(vec!["column_name".to_string()], vec![vec![None]]);
        let err = required(&rs, 0, "column_name").unwrap_err();
        assert_eq!(err.kind(), "SchemaError");
    }
}
