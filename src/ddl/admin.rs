//! Administrative scripts: tear-down and data-clear companions to the
//! provisioning script. Both are guarded so they run cleanly against a
//! database in any intermediate state.

use std::fmt::Write;

use crate::model::identifiers::qualify;
use crate::model::tables::TableModel;

/// Render `schema.drop.sql`: drop every foreign key, then every table,
/// children before parents.
pub fn render_drop_script(model: &TableModel) -> String {
    let mut sql = String::new();
    let schema = &model.schema;

    for table in model.tables() {
        for fk in &table.foreign_keys {
            let _ = writeln!(
                sql,
                "IF EXISTS (SELECT 1 FROM sys.foreign_keys WHERE name = N'{}' AND schema_id = SCHEMA_ID(N'{}'))",
                fk.name, schema
            );
            let _ = writeln!(
                sql,
                "    ALTER TABLE {} DROP CONSTRAINT [{}];",
                qualify(schema, &table.name),
                fk.name
            );
        }
    }
    sql.push('\n');

    // Creation order is parent-before-child, so the reverse is FK-safe.
    for table in model.tables().iter().rev() {
        let _ = writeln!(
            sql,
            "IF EXISTS (SELECT 1 FROM sys.tables WHERE name = N'{}' AND schema_id = SCHEMA_ID(N'{}'))",
            table.name, schema
        );
        let _ = writeln!(sql, "    DROP TABLE {};", qualify(schema, &table.name));
    }

    sql
}

/// Render `schema.clear.sql`: delete all rows, children before parents.
pub fn render_clear_script(model: &TableModel) -> String {
    let mut sql = String::new();
    for table in model.tables().iter().rev() {
        let _ = writeln!(sql, "DELETE FROM {};", qualify(&model.schema, &table.name));
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> TableModel {
        let mut m = TableModel::new("xsd");
        m.ensure_table("Root");
        m.ensure_table("RootItem");
        m
    }

    #[test]
    fn test_drop_script_reverses_creation_order() {
        let sql = render_drop_script(&model());
        let child = sql.find("DROP TABLE [xsd].[RootItem]").unwrap();
        let parent = sql.find("DROP TABLE [xsd].[Root];").unwrap();
        assert!(child < parent);
    }

    #[test]
    fn test_clear_script_deletes_children_first() {
        let sql = render_clear_script(&model());
        let child = sql.find("DELETE FROM [xsd].[RootItem];").unwrap();
        let parent = sql.find("DELETE FROM [xsd].[Root];").unwrap();
        assert!(child < parent);
    }
}
