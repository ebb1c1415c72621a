//! XML text to SQL value coercion, plus the type-appropriate defaults used
//! to backfill required columns.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::db::SqlValue;
use crate::model::tables::SqlType;

/// Coerce element or attribute text into a value for `sql_type`.
/// Unparseable input falls back to text and lets the database decide.
pub fn coerce(text: &str, sql_type: &SqlType) -> SqlValue {
    let trimmed = text.trim();
    match sql_type {
        SqlType::Int | SqlType::BigInt | SqlType::SmallInt | SqlType::TinyInt => trimmed
            .parse::<i64>()
            .map(SqlValue::Int)
            .unwrap_or_else(|_| SqlValue::Text(trimmed.to_string())),
        SqlType::Decimal(_, _) | SqlType::Float | SqlType::Real => trimmed
            .parse::<f64>()
            .map(SqlValue::Float)
            .unwrap_or_else(|_| SqlValue::Text(trimmed.to_string())),
        SqlType::Bit => match trimmed {
            "true" | "1" => SqlValue::Bool(true),
            "false" | "0" => SqlValue::Bool(false),
            _ => SqlValue::Text(trimmed.to_string()),
        },
        SqlType::Date => SqlValue::Text(
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|_| trimmed.to_string()),
        ),
        SqlType::DateTime2 => SqlValue::Text(
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f"))
                .map(|d| d.format("%Y-%m-%dT%H:%M:%S%.3f").to_string())
                .unwrap_or_else(|_| trimmed.to_string()),
        ),
        SqlType::Time => SqlValue::Text(
            NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|_| trimmed.to_string()),
        ),
        SqlType::NVarChar(_) => SqlValue::Text(text.to_string()),
    }
}

/// The backfill value for a required column that the document left unbound
pub fn default_for(sql_type: &SqlType) -> SqlValue {
    match sql_type {
        SqlType::NVarChar(_) => SqlValue::Text(String::new()),
        SqlType::Int | SqlType::BigInt | SqlType::SmallInt | SqlType::TinyInt => SqlValue::Int(0),
        SqlType::Decimal(_, _) | SqlType::Float | SqlType::Real => SqlValue::Float(0.0),
        SqlType::Bit => SqlValue::Bool(false),
        SqlType::Date => SqlValue::Text("1900-01-01".to_string()),
        SqlType::DateTime2 => SqlValue::Text("1900-01-01T00:00:00.000".to_string()),
        SqlType::Time => SqlValue::Text("00:00:00".to_string()),
    }
}
