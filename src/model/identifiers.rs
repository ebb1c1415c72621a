//! Centralized identifier handling for deriving SQL Server names from XSD names.
//!
//! This module provides the consistent functions used everywhere a table,
//! column, or constraint name is derived from schema input. The functions
//! are total and deterministic: the same input always yields the same
//! identifier, and every input yields a usable identifier.
//!
//! # Examples
//!
//! ```ignore
//! use crate::model::identifiers::*;
//!
//! // Replace anything non-alphanumeric and guard the edge cases
//! assert_eq!(sanitize("order-line"), "order_line");
//! assert_eq!(sanitize("9lives"), "N_9lives");
//!
//! // PascalCase on `_`, `-`, and space boundaries
//! assert_eq!(pascal("order_line"), "OrderLine");
//!
//! // Qualified two-part names
//! assert_eq!(qualify("xsd", "Root"), "[xsd].[Root]");
//! ```

/// Sanitizes a raw XSD name into a SQL identifier.
///
/// Replaces every non-alphanumeric character with `_`, trims leading and
/// trailing underscores, maps the empty result to `"Id"`, and prefixes
/// `N_` when the result would start with a digit.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(sanitize("order.line"), "order_line");
/// assert_eq!(sanitize("__x__"), "x");
/// assert_eq!(sanitize("--"), "Id");
/// assert_eq!(sanitize("42nd"), "N_42nd");
/// ```
pub fn sanitize(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let trimmed = replaced.trim_matches('_');
    if trimmed.is_empty() {
        return "Id".to_string();
    }
    if trimmed.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        format!("N_{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Converts a name to PascalCase.
///
/// Splits on `_`, `-`, and space, uppercases the first letter of each part,
/// and concatenates. Characters after the first of each part keep their
/// case, so acronyms survive (`XML_feed` -> `XMLFeed`).
///
/// # Examples
///
/// ```ignore
/// assert_eq!(pascal("order_line"), "OrderLine");
/// assert_eq!(pascal("order line-item"), "OrderLineItem");
/// assert_eq!(pascal("already"), "Already");
/// ```
pub fn pascal(s: &str) -> String {
    s.split(['_', '-', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Formats a qualified `[schema].[name]` two-part identifier.
pub fn qualify(schema: &str, name: &str) -> String {
    format!("[{}].[{}]", schema, name)
}

/// Derives a table identifier from a raw XSD local name: sanitize, then PascalCase.
pub fn table_ident(raw: &str) -> String {
    pascal(&sanitize(raw))
}

/// Derives the namespace token used to disambiguate colliding table names:
/// the last meaningful segment of the namespace URI, PascalCased.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(namespace_token("urn:schemas:orders"), "Orders");
/// assert_eq!(namespace_token("http://example.com/billing/"), "Billing");
/// ```
pub fn namespace_token(namespace: &str) -> String {
    let candidate = namespace
        .rsplit([':', '/', '#'])
        .find(|segment| !segment.is_empty() && !segment.eq_ignore_ascii_case("www"))
        .unwrap_or("");
    table_ident(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_non_alphanumerics() {
        assert_eq!(sanitize("order.line"), "order_line");
        assert_eq!(sanitize("a b/c"), "a_b_c");
        assert_eq!(sanitize("plain"), "plain");
    }

    #[test]
    fn test_sanitize_trims_underscores() {
        assert_eq!(sanitize("__x__"), "x");
        assert_eq!(sanitize("_a_b_"), "a_b");
    }

    #[test]
    fn test_sanitize_empty_becomes_id() {
        assert_eq!(sanitize(""), "Id");
        assert_eq!(sanitize("--"), "Id");
        assert_eq!(sanitize("___"), "Id");
    }

    #[test]
    fn test_sanitize_leading_digit_prefixed() {
        assert_eq!(sanitize("42nd"), "N_42nd");
        assert_eq!(sanitize("9"), "N_9");
    }

    #[test]
    fn test_pascal_splits_on_separators() {
        assert_eq!(pascal("order_line"), "OrderLine");
        assert_eq!(pascal("order line-item"), "OrderLineItem");
        assert_eq!(pascal("a__b"), "AB");
    }

    #[test]
    fn test_pascal_preserves_tail_case() {
        assert_eq!(pascal("XMLfeed"), "XMLfeed");
        assert_eq!(pascal("xml_FEED"), "XmlFEED");
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("xsd", "Root"), "[xsd].[Root]");
    }

    #[test]
    fn test_table_ident_composes() {
        assert_eq!(table_ident("order-line"), "OrderLine");
        assert_eq!(table_ident("9lives"), "N9lives");
    }

    #[test]
    fn test_namespace_token() {
        assert_eq!(namespace_token("urn:schemas:orders"), "Orders");
        assert_eq!(namespace_token("http://example.com/billing/"), "Billing");
        assert_eq!(namespace_token(""), "Id");
    }
}
