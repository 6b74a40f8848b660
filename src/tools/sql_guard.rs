//! Read-only validation for `executeSql`.
//!
//! Checks run in a fixed order and the first failure wins:
//! 1. the query must be present and not blank
//! 2. the trimmed, lowercased text must start with `select`
//! 3. it must not contain any of [`MODIFYING_KEYWORDS`]
//! 4. in [`SqlGuardMode::Parser`] mode only, every statement must parse as a
//!    query with [sqlparser](https://docs.rs/sqlparser/) using the connection's
//!    dialect
//!
//! The keyword denylist is a substring match on the normalized text. It will
//! reject a harmless `'drop '` inside a string literal or comment, and it will
//! miss a keyword followed by a tab or newline instead of a space. It is a
//! best-effort filter; the read-only transaction and session are what actually
//! keep the database unchanged.

use crate::config::SqlGuardMode;
use crate::models::DatabaseType;
use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

/// Substrings that disqualify a query. Each includes its trailing space.
pub const MODIFYING_KEYWORDS: [&str; 9] = [
    "insert ", "update ", "delete ", "drop ", "create ", "alter ", "truncate ", "grant ",
    "revoke ",
];

/// Response text for each rejection.
mod error_messages {
    pub const EMPTY: &str = "Error: SQL query cannot be empty.";
    pub const NOT_SELECT: &str = "Error: Only SELECT queries are allowed by this tool for safety.";
    pub const MODIFYING_KEYWORD: &str =
        "Error: Query contains potentially modifying keywords and is disallowed for safety.";
    pub const PARSE_ERROR: &str = "Error: Query could not be parsed for safety validation:";
}

/// Why a query was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    NotSelect,
    ModifyingKeyword(&'static str),
    Unparseable(String),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str(error_messages::EMPTY),
            Self::NotSelect => f.write_str(error_messages::NOT_SELECT),
            Self::ModifyingKeyword(_) => f.write_str(error_messages::MODIFYING_KEYWORD),
            Self::Unparseable(reason) => write!(f, "{} {}", error_messages::PARSE_ERROR, reason),
        }
    }
}

/// Get the appropriate SQL dialect for the given database type.
fn get_dialect(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::PostgreSQL => Box::new(PostgreSqlDialect {}),
        DatabaseType::MySQL => Box::new(MySqlDialect {}),
        DatabaseType::SQLite => Box::new(SQLiteDialect {}),
    }
}

/// Validator for ad-hoc queries.
#[derive(Debug, Clone, Copy)]
pub struct SqlGuard {
    mode: SqlGuardMode,
    db_type: DatabaseType,
}

impl SqlGuard {
    pub fn new(mode: SqlGuardMode, db_type: DatabaseType) -> Self {
        Self { mode, db_type }
    }

    pub fn mode(&self) -> SqlGuardMode {
        self.mode
    }

    /// Return the query to run, or why it was refused.
    ///
    /// # Examples
    ///
    /// ```
    /// use schema_mcp_server::config::SqlGuardMode;
    /// use schema_mcp_server::models::DatabaseType;
    /// use schema_mcp_server::tools::sql_guard::{Rejection, SqlGuard};
    ///
    /// let guard = SqlGuard::new(SqlGuardMode::Denylist, DatabaseType::PostgreSQL);
    /// assert!(guard.check(Some("SELECT * FROM users")).is_ok());
    /// assert_eq!(guard.check(Some("UPDATE t SET x = 1")), Err(Rejection::NotSelect));
    /// ```
    pub fn check<'a>(&self, sql: Option<&'a str>) -> Result<&'a str, Rejection> {
        let sql = match sql {
            Some(s) if !s.trim().is_empty() => s,
            _ => return Err(Rejection::Empty),
        };

        let normalized = sql.trim().to_lowercase();
        if !normalized.starts_with("select") {
            return Err(Rejection::NotSelect);
        }

        if let Some(keyword) = MODIFYING_KEYWORDS
            .into_iter()
            .find(|keyword| normalized.contains(keyword))
        {
            return Err(Rejection::ModifyingKeyword(keyword));
        }

        if self.mode == SqlGuardMode::Parser {
            self.check_parsed(sql)?;
        }

        Ok(sql)
    }

    fn check_parsed(&self, sql: &str) -> Result<(), Rejection> {
        let dialect = get_dialect(self.db_type);
        let statements = Parser::parse_sql(dialect.as_ref(), sql)
            .map_err(|e| Rejection::Unparseable(e.to_string()))?;

        if statements.is_empty() {
            return Err(Rejection::Empty);
        }
        if statements
            .iter()
            .all(|stmt| matches!(stmt, Statement::Query(_)))
        {
            Ok(())
        } else {
            Err(Rejection::NotSelect)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn denylist() -> SqlGuard {
        SqlGuard::new(SqlGuardMode::Denylist, DatabaseType::PostgreSQL)
    }

    fn parser() -> SqlGuard {
        SqlGuard::new(SqlGuardMode::Parser, DatabaseType::PostgreSQL)
    }

    #[test]
    fn test_missing_or_blank_is_empty() {
        assert_eq!(denylist().check(None), Err(Rejection::Empty));
        assert_eq!(denylist().check(Some("")), Err(Rejection::Empty));
        assert_eq!(denylist().check(Some("   \n\t")), Err(Rejection::Empty));
    }

    #[test]
    fn test_select_is_allowed_and_returned_unchanged() {
        let sql = "  SELECT id FROM users  ";
        assert_eq!(denylist().check(Some(sql)), Ok(sql));
    }

    #[test]
    fn test_prefix_is_case_insensitive() {
        assert!(denylist().check(Some("sElEcT 1")).is_ok());
    }

    #[test]
    fn test_non_select_rejected() {
        for sql in [
            "UPDATE t SET x=1",
            "WITH x AS (SELECT 1) SELECT * FROM x",
            "EXPLAIN SELECT 1",
            "DROP TABLE t",
        ] {
            assert_eq!(denylist().check(Some(sql)), Err(Rejection::NotSelect), "{sql}");
        }
    }

    #[test]
    fn test_modifying_keyword_after_select_rejected() {
        let result = denylist().check(Some("select * from t; DROP TABLE t"));
        assert_eq!(result, Err(Rejection::ModifyingKeyword("drop ")));
    }

    #[test]
    fn test_keyword_inside_literal_is_a_false_positive() {
        let result = denylist().check(Some("SELECT 'please update me' AS note"));
        assert_eq!(result, Err(Rejection::ModifyingKeyword("update ")));
    }

    #[test]
    fn test_keyword_followed_by_newline_is_missed() {
        assert!(denylist().check(Some("select 1;\ndrop\ntable t")).is_ok());
    }

    #[test]
    fn test_identifier_containing_keyword_without_space_allowed() {
        assert!(denylist().check(Some("SELECT created_at, updated_at FROM t")).is_ok());
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(
            Rejection::Empty.to_string(),
            "Error: SQL query cannot be empty."
        );
        assert_eq!(
            Rejection::NotSelect.to_string(),
            "Error: Only SELECT queries are allowed by this tool for safety."
        );
        assert_eq!(
            Rejection::ModifyingKeyword("drop ").to_string(),
            "Error: Query contains potentially modifying keywords and is disallowed for safety."
        );
        assert!(
            Rejection::Unparseable("bad token".to_string())
                .to_string()
                .ends_with("validation: bad token")
        );
    }

    #[test]
    fn test_parser_mode_catches_what_denylist_misses() {
        let sql = "select 1;\ndrop\ntable t";
        assert!(denylist().check(Some(sql)).is_ok());
        assert_eq!(parser().check(Some(sql)), Err(Rejection::NotSelect));
    }

    #[test]
    fn test_parser_mode_allows_plain_queries() {
        let sql = "SELECT u.name FROM users u JOIN orders o ON o.user_id = u.id UNION SELECT 'x'";
        assert!(parser().check(Some(sql)).is_ok());
    }

    #[test]
    fn test_parser_mode_reports_parse_errors() {
        let result = parser().check(Some("SELECT FROM WHERE ((("));
        assert!(matches!(result, Err(Rejection::Unparseable(_))));
    }

    #[test]
    fn test_denylist_runs_before_parser() {
        let result = parser().check(Some("SELECT 1; DELETE FROM t"));
        assert_eq!(result, Err(Rejection::ModifyingKeyword("delete ")));
    }

    #[test]
    fn test_parser_uses_connection_dialect() {
        let guard = SqlGuard::new(SqlGuardMode::Parser, DatabaseType::MySQL);
        assert!(guard.check(Some("SELECT `id` FROM `users`")).is_ok());
    }
}
