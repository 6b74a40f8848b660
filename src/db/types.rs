//! Database-agnostic value rendering.
//!
//! Every cell a query returns is rendered as text so results can be printed
//! without coercion.
//!
//! # Architecture
//!
//! Conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders extract the value and render it
//!
//! When a typed decode fails the decoders fall back to the driver's textual
//! form of the value, so a cell is only ever `None` for SQL NULL.

use crate::models::DatabaseType;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Temporal,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if db == DatabaseType::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower == "date"
        || lower == "time"
        || lower == "timetz"
        || lower.starts_with("timestamp")
        || lower.starts_with("datetime")
    {
        return TypeCategory::Temporal;
    }

    // "interval" and "point" would otherwise match the "int" check
    if lower == "interval" || lower.contains("point") {
        return TypeCategory::Unknown;
    }

    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    // UUID (PostgreSQL)
    if lower == "uuid" {
        return TypeCategory::Uuid;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") || lower == "name" || lower == "clob" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Shared Rendering
// =============================================================================

/// Render binary data as UTF-8 text when valid, otherwise base64.
pub fn render_binary(bytes: &[u8]) -> String {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => STANDARD.encode(bytes),
    }
}

/// Render a float, keeping `.0` on integral values.
pub fn render_float<F>(v: F) -> String
where
    F: Into<f64> + std::fmt::Display + Copy,
{
    let wide: f64 = v.into();
    if wide.is_finite() && wide.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        v.to_string()
    }
}

pub fn render_datetime_utc(v: DateTime<Utc>) -> String {
    v.to_rfc3339()
}

pub fn render_datetime(v: NaiveDateTime) -> String {
    v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

pub fn render_date(v: NaiveDate) -> String {
    v.format("%Y-%m-%d").to_string()
}

pub fn render_time(v: NaiveTime) -> String {
    v.format("%H:%M:%S%.f").to_string()
}

// =============================================================================
// Row to Text Trait
// =============================================================================

/// Trait for converting database rows to textual cells.
pub trait RowToText {
    /// Column names in the order the database returned them.
    fn column_names(&self) -> Vec<String>;

    /// One value per column; `None` is SQL NULL.
    fn to_text_values(&self) -> Vec<Option<String>>;
}

fn column_names<R: Row>(row: &R) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

fn text_values<R>(
    row: &R,
    db: DatabaseType,
    decode: fn(&R, usize, TypeCategory) -> String,
) -> Vec<Option<String>>
where
    R: Row,
    usize: ColumnIndex<R>,
{
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let is_null = row.try_get_raw(idx).map(|v| v.is_null()).unwrap_or(true);
            if is_null {
                return None;
            }
            let category = categorize_type(col.type_info().name(), db);
            Some(decode(row, idx, category))
        })
        .collect()
}

impl RowToText for MySqlRow {
    fn column_names(&self) -> Vec<String> {
        column_names(self)
    }

    fn to_text_values(&self) -> Vec<Option<String>> {
        text_values(self, DatabaseType::MySQL, mysql::decode_column)
    }
}

impl RowToText for PgRow {
    fn column_names(&self) -> Vec<String> {
        column_names(self)
    }

    fn to_text_values(&self) -> Vec<Option<String>> {
        text_values(self, DatabaseType::PostgreSQL, postgres::decode_column)
    }
}

impl RowToText for SqliteRow {
    fn column_names(&self) -> Vec<String> {
        column_names(self)
    }

    fn to_text_values(&self) -> Vec<Option<String>> {
        text_values(self, DatabaseType::SQLite, sqlite::decode_column)
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> String {
        let typed = match category {
            TypeCategory::Decimal => row.try_get::<RawDecimal, _>(idx).ok().map(|v| v.0),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => row.try_get::<bool, _>(idx).ok().map(|v| v.to_string()),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => row
                .try_get::<Vec<u8>, _>(idx)
                .ok()
                .map(|v| render_binary(&v)),
            TypeCategory::Json => row
                .try_get::<serde_json::Value, _>(idx)
                .ok()
                .map(|v| v.to_string()),
            TypeCategory::Temporal => decode_temporal(row, idx),
            _ => None,
        };
        typed.unwrap_or_else(|| decode_text(row, idx))
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Option<String> {
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Some(v.to_string());
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return Some(v.to_string());
        }
        if let Ok(v) = row.try_get::<i16, _>(idx) {
            return Some(v.to_string());
        }
        if let Ok(v) = row.try_get::<i8, _>(idx) {
            return Some(v.to_string());
        }
        if let Ok(v) = row.try_get::<u64, _>(idx) {
            return Some(v.to_string());
        }
        if let Ok(v) = row.try_get::<u32, _>(idx) {
            return Some(v.to_string());
        }
        if let Ok(v) = row.try_get::<u16, _>(idx) {
            return Some(v.to_string());
        }
        row.try_get::<u8, _>(idx).ok().map(|v| v.to_string())
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Option<String> {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Some(render_float(v));
        }
        row.try_get::<f32, _>(idx).ok().map(render_float)
    }

    fn decode_temporal(row: &MySqlRow, idx: usize) -> Option<String> {
        if let Ok(v) = row.try_get::<DateTime<Utc>, _>(idx) {
            return Some(render_datetime_utc(v));
        }
        if let Ok(v) = row.try_get::<NaiveDateTime, _>(idx) {
            return Some(render_datetime(v));
        }
        if let Ok(v) = row.try_get::<NaiveDate, _>(idx) {
            return Some(render_date(v));
        }
        row.try_get::<NaiveTime, _>(idx).ok().map(render_time)
    }

    fn decode_text(row: &MySqlRow, idx: usize) -> String {
        if let Ok(v) = row.try_get_unchecked::<String, _>(idx) {
            return v;
        }
        row.try_get_unchecked::<Vec<u8>, _>(idx)
            .map(|v| render_binary(&v))
            .unwrap_or_default()
    }
}

mod postgres {
    use super::*;

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> String {
        let typed = match category {
            TypeCategory::Decimal => row.try_get::<RawDecimal, _>(idx).ok().map(|v| v.0),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => row.try_get::<bool, _>(idx).ok().map(|v| v.to_string()),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => row
                .try_get::<Vec<u8>, _>(idx)
                .ok()
                .map(|v| render_binary(&v)),
            TypeCategory::Json => row
                .try_get::<serde_json::Value, _>(idx)
                .ok()
                .map(|v| v.to_string()),
            TypeCategory::Uuid => row
                .try_get::<uuid::Uuid, _>(idx)
                .ok()
                .map(|v| v.hyphenated().to_string()),
            TypeCategory::Temporal => decode_temporal(row, idx),
            _ => None,
        };
        typed.unwrap_or_else(|| decode_text(row, idx))
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Option<String> {
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Some(v.to_string());
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return Some(v.to_string());
        }
        row.try_get::<i16, _>(idx).ok().map(|v| v.to_string())
    }

    fn decode_float(row: &PgRow, idx: usize) -> Option<String> {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Some(render_float(v));
        }
        row.try_get::<f32, _>(idx).ok().map(render_float)
    }

    fn decode_temporal(row: &PgRow, idx: usize) -> Option<String> {
        if let Ok(v) = row.try_get::<DateTime<Utc>, _>(idx) {
            return Some(render_datetime_utc(v));
        }
        if let Ok(v) = row.try_get::<NaiveDateTime, _>(idx) {
            return Some(render_datetime(v));
        }
        if let Ok(v) = row.try_get::<NaiveDate, _>(idx) {
            return Some(render_date(v));
        }
        row.try_get::<NaiveTime, _>(idx).ok().map(render_time)
    }

    fn decode_text(row: &PgRow, idx: usize) -> String {
        row.try_get_unchecked::<String, _>(idx).unwrap_or_default()
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize, category: TypeCategory) -> String {
        let typed = match category {
            TypeCategory::Integer => row.try_get::<i64, _>(idx).ok().map(|v| v.to_string()),
            TypeCategory::Boolean => row.try_get::<bool, _>(idx).ok().map(|v| v.to_string()),
            TypeCategory::Float | TypeCategory::Decimal => {
                row.try_get::<f64, _>(idx).ok().map(render_float)
            }
            TypeCategory::Binary => row
                .try_get::<Vec<u8>, _>(idx)
                .ok()
                .map(|v| render_binary(&v)),
            TypeCategory::Temporal => decode_temporal(row, idx),
            _ => None,
        };
        typed.unwrap_or_else(|| decode_text(row, idx))
    }

    fn decode_temporal(row: &SqliteRow, idx: usize) -> Option<String> {
        if let Ok(v) = row.try_get::<NaiveDateTime, _>(idx) {
            return Some(render_datetime(v));
        }
        row.try_get::<NaiveDate, _>(idx).ok().map(render_date)
    }

    fn decode_text(row: &SqliteRow, idx: usize) -> String {
        if let Ok(v) = row.try_get_unchecked::<String, _>(idx) {
            return v;
        }
        row.try_get_unchecked::<Vec<u8>, _>(idx)
            .map(|v| render_binary(&v))
            .unwrap_or_default()
    }
}
