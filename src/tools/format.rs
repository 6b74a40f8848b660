//! Output formatting utilities for the schema tools.
//!
//! Every tool response is plain newline-delimited text. The functions here
//! only render; they never touch the database.

use crate::models::{ColumnDescriptor, ForeignKeyEdge, QueryResultSet};
use unicode_width::UnicodeWidthStr;

const NULL_TEXT: &str = "NULL";
const COLUMN_SEPARATOR: &str = " | ";

pub fn format_table_schema(table: &str, schema: &str, columns: &[ColumnDescriptor]) -> String {
    if columns.is_empty() {
        return format!(
            "Table '{}' not found or has no columns in the {} schema.",
            table, schema
        );
    }

    let lines: Vec<String> = columns
        .iter()
        .map(|c| format!("{} ({})", c.name, c.declared_type))
        .collect();
    format!("Schema for table '{}':\n{}", table, lines.join("\n"))
}

/// Outgoing edges are printed under the requested name, not the catalog's
/// spelling of it.
pub fn format_dependencies(table: &str, schema: &str, edges: &[ForeignKeyEdge]) -> String {
    if edges.is_empty() {
        return format!(
            "Table '{}' has no outgoing foreign key dependencies in the {} schema.",
            table, schema
        );
    }

    let lines: Vec<String> = edges
        .iter()
        .map(|e| {
            format!(
                "{} ({}) -> {} ({})",
                table, e.source_column, e.target_table, e.target_column
            )
        })
        .collect();
    format!("Dependencies for table '{}':\n{}", table, lines.join("\n"))
}

pub fn format_referenced_by(table: &str, schema: &str, edges: &[ForeignKeyEdge]) -> String {
    if edges.is_empty() {
        return format!(
            "Table '{}' is not referenced by any foreign keys in the {} schema.",
            table, schema
        );
    }

    let lines: Vec<String> = edges
        .iter()
        .map(|e| {
            format!(
                "{} ({}) references {} ({})",
                e.source_table, e.source_column, table, e.target_column
            )
        })
        .collect();
    format!("Tables referencing table '{}':\n{}", table, lines.join("\n"))
}

/// Render a result set as a header, a dash separator and one line per row.
///
/// The separator is as wide as the header's display width, so wide
/// characters in column names still line up in a terminal.
pub fn format_result_set(rs: &QueryResultSet) -> String {
    if rs.is_empty() {
        return "Query executed successfully, but returned no results.".to_string();
    }

    let header = rs.columns.join(COLUMN_SEPARATOR);
    let mut output = String::from("Query Results:\n");
    output.push_str(&header);
    output.push('\n');
    output.push_str(&"-".repeat(header.width()));
    output.push('\n');

    for row in &rs.rows {
        let cells: Vec<&str> = row
            .iter()
            .map(|value| value.as_deref().unwrap_or(NULL_TEXT))
            .collect();
        output.push_str(&cells.join(COLUMN_SEPARATOR));
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(st: &str, sc: &str, tt: &str, tc: &str) -> ForeignKeyEdge {
        ForeignKeyEdge::new(st, sc, tt, tc)
    }

    #[test]
    fn test_table_schema_lines_in_order() {
        let columns = vec![
            ColumnDescriptor::new("id", "integer"),
            ColumnDescriptor::new("name", "character varying"),
        ];
        assert_eq!(
            format_table_schema("users", "public", &columns),
            "Schema for table 'users':\nid (integer)\nname (character varying)"
        );
    }

    #[test]
    fn test_table_schema_not_found() {
        assert_eq!(
            format_table_schema("ghost", "public", &[]),
            "Table 'ghost' not found or has no columns in the public schema."
        );
    }

    #[test]
    fn test_not_found_names_configured_schema() {
        assert!(format_table_schema("t", "main", &[]).ends_with("in the main schema."));
        assert!(format_dependencies("t", "shop", &[]).ends_with("in the shop schema."));
        assert!(format_referenced_by("t", "app", &[]).ends_with("in the app schema."));
    }

    #[test]
    fn test_dependencies() {
        let edges = vec![edge("orders", "user_id", "users", "id")];
        assert_eq!(
            format_dependencies("orders", "public", &edges),
            "Dependencies for table 'orders':\norders (user_id) -> users (id)"
        );
    }

    #[test]
    fn test_dependencies_use_requested_name() {
        let edges = vec![edge("orders", "user_id", "users", "id")];
        let out = format_dependencies("ORDERS", "public", &edges);
        assert!(out.ends_with("ORDERS (user_id) -> users (id)"));
    }

    #[test]
    fn test_no_dependencies() {
        assert_eq!(
            format_dependencies("users", "public", &[]),
            "Table 'users' has no outgoing foreign key dependencies in the public schema."
        );
    }

    #[test]
    fn test_referenced_by() {
        let edges = vec![
            edge("orders", "user_id", "users", "id"),
            edge("reviews", "author_id", "users", "id"),
        ];
        assert_eq!(
            format_referenced_by("users", "public", &edges),
            "Tables referencing table 'users':\n\
             orders (user_id) references users (id)\n\
             reviews (author_id) references users (id)"
        );
    }

    #[test]
    fn test_not_referenced() {
        assert_eq!(
            format_referenced_by("orders", "public", &[]),
            "Table 'orders' is not referenced by any foreign keys in the public schema."
        );
    }

    #[test]
    fn test_result_set_single_value() {
        let rs = QueryResultSet::new(
            vec!["?column?".to_string()],
            vec![vec![Some("1".to_string())]],
        );
        assert_eq!(
            format_result_set(&rs),
            "Query Results:\n?column?\n--------\n1\n"
        );
    }

    #[test]
    fn test_result_set_null_and_separator_width() {
        let rs = QueryResultSet::new(
            vec!["col_a".to_string(), "col_b".to_string()],
            vec![vec![Some("v1".to_string()), None]],
        );
        assert_eq!(
            format_result_set(&rs),
            "Query Results:\ncol_a | col_b\n-------------\nv1 | NULL\n"
        );
    }

    #[test]
    fn test_result_set_separator_uses_display_width() {
        let rs = QueryResultSet::new(vec!["名前".to_string()], vec![vec![Some("x".to_string())]]);
        let out = format_result_set(&rs);
        let separator = out.lines().nth(2).unwrap();
        assert_eq!(separator, "----");
    }

    #[test]
    fn test_result_set_rows_split_back_into_cells() {
        let rs = QueryResultSet::new(
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec![
                vec![Some("1".to_string()), Some("x".to_string()), None],
                vec![None, Some("y".to_string()), Some("3".to_string())],
            ],
        );
        let out = format_result_set(&rs);
        let body: Vec<Vec<&str>> = out
            .lines()
            .skip(3)
            .map(|line| line.split(" | ").collect())
            .collect();
        assert_eq!(body, vec![vec!["1", "x", "NULL"], vec!["NULL", "y", "3"]]);
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_empty_result_set() {
        assert_eq!(
            format_result_set(&QueryResultSet::default()),
            "Query executed successfully, but returned no results."
        );
    }
}
