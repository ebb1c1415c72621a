//! Human-readable schema summary, the first artifact an operator reads
//! after pointing the tool at a new XSD.

use std::fmt::Write;

use crate::model::identifiers::qualify;
use crate::model::tables::TableModel;

/// Render `schema_summary.txt`
pub fn render_schema_summary(model: &TableModel) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Schema: {}", model.schema);
    let _ = writeln!(out, "Tables: {}", model.tables().len());
    let _ = writeln!(out);

    for table in model.tables() {
        let _ = writeln!(out, "{}", qualify(&model.schema, &table.name));
        for column in &table.columns {
            let mut flags = Vec::new();
            if column.is_primary_key {
                flags.push("PK");
            }
            if column.identity {
                flags.push("IDENTITY");
            }
            if table.is_fk_column(&column.name) {
                flags.push("FK");
            }
            flags.push(if column.nullable { "NULL" } else { "NOT NULL" });
            let _ = writeln!(
                out,
                "  - {} {} {}",
                column.name,
                column.sql_type,
                flags.join(" ")
            );
        }
        for fk in &table.foreign_keys {
            let _ = writeln!(
                out,
                "  FK {} -> {} ({})",
                fk.name,
                qualify(&fk.ref_schema, &fk.ref_table),
                fk.ref_column
            );
        }
        for unique in &table.uniques {
            let _ = writeln!(out, "  UNIQUE {} ({})", unique.name, unique.columns.join(", "));
        }
        for check in &table.checks {
            let _ = writeln!(out, "  CHECK {}: {}", check.name, check.expression);
        }
        let _ = writeln!(out);
    }

    if !model.bindings.is_empty() {
        let _ = writeln!(out, "Global elements:");
        for binding in &model.bindings {
            let _ = writeln!(
                out,
                "- {}{} -> {}",
                binding
                    .namespace
                    .as_deref()
                    .map(|ns| format!("{{{}}}", ns))
                    .unwrap_or_default(),
                binding.local_name,
                binding.table_name
            );
        }
    }

    out
}
