//! Mapping from XSD simple types and facets to SQL Server column types and
//! CHECK predicates.

use crate::model::tables::SqlType;
use crate::xsd::XsdSimpleType;

/// Width above which string columns fall back to `NVARCHAR(MAX)`
const NVARCHAR_CAP: u32 = 4000;

/// Map a flattened simple type to its SQL Server column type
pub fn map_simple_type(st: &XsdSimpleType) -> SqlType {
    let facets = &st.facets;
    match st.primitive.as_str() {
        "string" | "normalizedString" | "token" | "Name" | "NCName" | "ID" | "IDREF"
        | "language" => SqlType::NVarChar(string_width(facets.length, facets.max_length, 255)),
        "anyURI" => SqlType::NVarChar(string_width(facets.length, facets.max_length, 512)),
        "decimal" => {
            let (p, s) = decimal_precision(facets.total_digits, facets.fraction_digits);
            SqlType::Decimal(p, s)
        }
        "integer" | "long" | "nonNegativeInteger" | "positiveInteger" | "nonPositiveInteger"
        | "negativeInteger" | "unsignedLong" => SqlType::BigInt,
        "int" | "unsignedShort" | "unsignedInt" => SqlType::Int,
        "short" => SqlType::SmallInt,
        "byte" | "unsignedByte" => SqlType::TinyInt,
        "boolean" => SqlType::Bit,
        "float" => SqlType::Real,
        "double" => SqlType::Float,
        "date" => SqlType::Date,
        "dateTime" => SqlType::DateTime2,
        "time" => SqlType::Time,
        "duration" => SqlType::NVarChar(Some(64)),
        _ => SqlType::NVarChar(Some(255)),
    }
}

/// Effective NVARCHAR width from length facets; widths beyond the cap
/// become `MAX` (`None`).
fn string_width(length: Option<u32>, max_length: Option<u32>, default: u32) -> Option<u32> {
    match length.or(max_length) {
        Some(n) if n > NVARCHAR_CAP => None,
        Some(n) => Some(n),
        None => Some(default),
    }
}

/// Derive `(precision, scale)` from digit facets, clamped to SQL Server's
/// DECIMAL limits. With neither facet the result is the `(18, 6)` default.
fn decimal_precision(total_digits: Option<u32>, fraction_digits: Option<u32>) -> (u8, u8) {
    let precision = match (total_digits, fraction_digits) {
        (Some(p), _) => p,
        (None, Some(s)) => s + 10,
        (None, None) => 18,
    };
    let precision = precision.clamp(1, 38) as u8;
    let scale = fraction_digits.unwrap_or(6).min(precision as u32) as u8;
    (precision, scale)
}

/// CHECK predicates implied by the type's facets, un-wrapped (the table adds
/// the `IS NULL OR` wrapper for nullable columns).
///
/// Length facets apply to string columns; `maxLength` is only enforced via
/// CHECK when the column is `NVARCHAR(MAX)` (a bounded width already
/// enforces it). Range facets apply to numeric and date/time columns.
pub fn facet_checks(column: &str, st: &XsdSimpleType, sql_type: &SqlType) -> Vec<String> {
    let facets = &st.facets;
    let mut checks = Vec::new();

    if sql_type.is_nvarchar() {
        if let Some(n) = facets.length {
            checks.push(format!("LEN([{}]) = {}", column, n));
        }
        if let Some(n) = facets.min_length {
            checks.push(format!("LEN([{}]) >= {}", column, n));
        }
        if facets.length.is_none() && sql_type.is_nvarchar_max() {
            if let Some(n) = facets.max_length {
                checks.push(format!("LEN([{}]) <= {}", column, n));
            }
        }
    }

    if is_range_comparable(sql_type) {
        let mut bound = |value: &Option<String>, op: &str| {
            if let Some(v) = value {
                if let Some(literal) = range_literal(v, sql_type) {
                    checks.push(format!("[{}] {} {}", column, op, literal));
                }
            }
        };
        bound(&facets.min_inclusive, ">=");
        bound(&facets.min_exclusive, ">");
        bound(&facets.max_inclusive, "<=");
        bound(&facets.max_exclusive, "<");
    }

    checks
}

fn is_range_comparable(sql_type: &SqlType) -> bool {
    matches!(
        sql_type,
        SqlType::Decimal(_, _)
            | SqlType::Int
            | SqlType::BigInt
            | SqlType::SmallInt
            | SqlType::TinyInt
            | SqlType::Float
            | SqlType::Real
            | SqlType::Date
            | SqlType::DateTime2
            | SqlType::Time
    )
}

/// Render a facet value as a SQL literal for its column type. Numeric
/// values must parse as numbers; date/time values are quoted. Anything
/// else is dropped rather than emitted verbatim.
fn range_literal(value: &str, sql_type: &SqlType) -> Option<String> {
    let trimmed = value.trim();
    match sql_type {
        SqlType::Date | SqlType::DateTime2 | SqlType::Time => {
            Some(format!("'{}'", trimmed.replace('\'', "''")))
        }
        _ => {
            trimmed.parse::<f64>().ok()?;
            Some(trimmed.to_string())
        }
    }
}
