//! T-SQL text rendering for the SQL Server adapter.
//!
//! Pure functions over the row commands; parameters are positional
//! (`@P1`, `@P2`, …) in column order.

use std::fmt::Write;

use crate::db::{RowInsert, RowProbe, TableRef};
use crate::model::identifiers::qualify;

/// `INSERT … VALUES (…); SELECT CAST(SCOPE_IDENTITY() AS INT);`
pub fn render_insert(insert: &RowInsert) -> String {
    let columns = insert
        .columns
        .iter()
        .map(|c| format!("[{}]", c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=insert.columns.len())
        .map(|i| format!("@P{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({}); SELECT CAST(SCOPE_IDENTITY() AS INT);",
        qualify(&insert.table.schema, &insert.table.table),
        columns,
        placeholders
    )
}

/// `INSERT … DEFAULT VALUES; SELECT CAST(SCOPE_IDENTITY() AS INT);`
pub fn render_default_insert(table: &TableRef) -> String {
    format!(
        "INSERT INTO {} DEFAULT VALUES; SELECT CAST(SCOPE_IDENTITY() AS INT);",
        qualify(&table.schema, &table.table)
    )
}

/// `SELECT TOP 1 <PK> … WHERE` a conjunction of NULL-safe equalities
pub fn render_probe(probe: &RowProbe) -> String {
    let mut sql = format!(
        "SELECT TOP 1 [{}] FROM {}",
        probe.table.pk_column,
        qualify(&probe.table.schema, &probe.table.table)
    );
    if !probe.columns.is_empty() {
        sql.push_str(" WHERE ");
        for (i, column) in probe.columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }
            let p = i + 1;
            let _ = write!(
                sql,
                "([{0}] = @P{1} OR ([{0}] IS NULL AND @P{1} IS NULL))",
                column, p
            );
        }
    }
    sql.push(';');
    sql
}
