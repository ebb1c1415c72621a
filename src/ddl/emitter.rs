//! Rendering of the provisioning script for the derived model.
//!
//! Statement order matters for a clean one-pass deploy: tables first, then
//! foreign keys, FK support indexes, unique constraints, lookup indexes for
//! multi-column uniques, and finally checks.

use std::fmt::Write;

use crate::model::identifiers::qualify;
use crate::model::tables::{Column, Table, TableModel};

/// Render the full `schema.sql` provisioning script
pub fn render_schema_script(model: &TableModel) -> String {
    let mut sql = String::new();
    let schema = &model.schema;

    let _ = writeln!(
        sql,
        "IF SCHEMA_ID(N'{0}') IS NULL EXEC(N'CREATE SCHEMA [{0}]');",
        schema
    );
    sql.push('\n');

    for table in model.tables() {
        render_create_table(&mut sql, schema, table);
        sql.push('\n');
    }

    for table in model.tables() {
        for fk in &table.foreign_keys {
            let _ = writeln!(
                sql,
                "ALTER TABLE {} ADD CONSTRAINT [{}] FOREIGN KEY ([{}]) REFERENCES {} ([{}]);",
                qualify(schema, &table.name),
                fk.name,
                fk.column_name,
                qualify(&fk.ref_schema, &fk.ref_table),
                fk.ref_column
            );
        }
    }
    sql.push('\n');

    for table in model.tables() {
        for fk in &table.foreign_keys {
            let _ = writeln!(
                sql,
                "CREATE INDEX [IX_{}_{}] ON {} ([{}]);",
                table.name,
                fk.column_name,
                qualify(schema, &table.name),
                fk.column_name
            );
        }
    }
    sql.push('\n');

    for table in model.tables() {
        for unique in &table.uniques {
            let columns = bracket_list(&unique.columns);
            let _ = writeln!(
                sql,
                "ALTER TABLE {} ADD CONSTRAINT [{}] UNIQUE ({});",
                qualify(schema, &table.name),
                unique.name,
                columns
            );
        }
    }
    sql.push('\n');

    // Multi-column uniques get a covering lookup index keyed for probes.
    for table in model.tables() {
        for unique in &table.uniques {
            if unique.columns.len() < 2 {
                continue;
            }
            let _ = writeln!(
                sql,
                "CREATE NONCLUSTERED INDEX [IX_{}_{}_Lookup] ON {} ({}) INCLUDE ([{}]);",
                table.name,
                unique.columns.join("_"),
                qualify(schema, &table.name),
                bracket_list(&unique.columns),
                table.pk_column()
            );
        }
    }
    sql.push('\n');

    for table in model.tables() {
        for check in &table.checks {
            let _ = writeln!(
                sql,
                "ALTER TABLE {} ADD CONSTRAINT [{}] CHECK ({});",
                qualify(schema, &table.name),
                check.name,
                check.expression
            );
        }
    }

    sql
}

fn render_create_table(sql: &mut String, schema: &str, table: &Table) {
    let _ = writeln!(sql, "CREATE TABLE {} (", qualify(schema, &table.name));
    let ordered = ordered_columns(table);
    for (i, column) in ordered.iter().enumerate() {
        let comma = if i + 1 < ordered.len() { "," } else { "" };
        let _ = writeln!(sql, "    {}{}", render_column(column), comma);
    }
    let _ = writeln!(sql, ");");
}

/// PK first, FK columns next, then insertion order
fn ordered_columns(table: &Table) -> Vec<&Column> {
    let mut ordered: Vec<&Column> = Vec::with_capacity(table.columns.len());
    ordered.extend(table.columns.iter().filter(|c| c.is_primary_key));
    ordered.extend(
        table
            .columns
            .iter()
            .filter(|c| !c.is_primary_key && table.is_fk_column(&c.name)),
    );
    ordered.extend(
        table
            .columns
            .iter()
            .filter(|c| !c.is_primary_key && !table.is_fk_column(&c.name)),
    );
    ordered
}

fn render_column(column: &Column) -> String {
    let mut def = format!("[{}] {}", column.name, column.sql_type);
    if column.identity {
        def.push_str(" IDENTITY(1,1)");
    }
    def.push_str(if column.nullable { " NULL" } else { " NOT NULL" });
    if column.is_primary_key {
        def.push_str(" PRIMARY KEY");
    }
    def
}

fn bracket_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| format!("[{}]", c))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tables::{Column, SqlType};

    fn two_table_model() -> TableModel {
        let mut m = TableModel::new("xsd");
        m.ensure_table("Root");
        m.ensure_table("RootItem");
        {
            let t = m.table_mut("RootItem").unwrap();
            t.add_or_merge_column(Column::plain("RootId", SqlType::Int, false));
            t.foreign_keys.push(crate::model::tables::ForeignKey {
                name: "FK_RootItem_Root".to_string(),
                column_name: "RootId".to_string(),
                ref_schema: "xsd".to_string(),
                ref_table: "Root".to_string(),
                ref_column: "RootId".to_string(),
            });
            t.add_or_merge_column(Column::plain("Id", SqlType::NVarChar(Some(255)), false));
            t.add_unique(vec!["Id".to_string()]);
        }
        m
    }

    #[test]
    fn test_schema_script_contains_expected_statements() {
        let sql = render_schema_script(&two_table_model());
        assert!(sql.contains("CREATE TABLE [xsd].[Root] ("));
        assert!(sql.contains("CREATE TABLE [xsd].[RootItem] ("));
        assert!(sql.contains("[RootItemId] INT IDENTITY(1,1) NOT NULL PRIMARY KEY"));
        assert!(sql.contains(
            "ALTER TABLE [xsd].[RootItem] ADD CONSTRAINT [FK_RootItem_Root] FOREIGN KEY ([RootId]) REFERENCES [xsd].[Root] ([RootId]);"
        ));
        assert!(sql.contains("CREATE INDEX [IX_RootItem_RootId] ON [xsd].[RootItem] ([RootId]);"));
        assert!(sql.contains(
            "ALTER TABLE [xsd].[RootItem] ADD CONSTRAINT [UQ_RootItem_Id] UNIQUE ([Id]);"
        ));
    }

    #[test]
    fn test_fk_column_renders_second() {
        let sql = render_schema_script(&two_table_model());
        let table_start = sql.find("CREATE TABLE [xsd].[RootItem]").unwrap();
        let body = &sql[table_start..];
        let pk = body.find("[RootItemId]").unwrap();
        let fk = body.find("[RootId] INT NOT NULL").unwrap();
        let other = body.find("[Id] NVARCHAR(255)").unwrap();
        assert!(pk < fk && fk < other);
    }

    #[test]
    fn test_multi_column_unique_gets_lookup_index() {
        let mut m = TableModel::new("xsd");
        m.ensure_table("Reg");
        {
            let t = m.table_mut("Reg").unwrap();
            t.add_or_merge_column(Column::plain("Code", SqlType::NVarChar(Some(10)), false));
            t.add_or_merge_column(Column::plain("Year", SqlType::Int, false));
            t.add_unique(vec!["Code".to_string(), "Year".to_string()]);
        }
        let sql = render_schema_script(&m);
        assert!(sql.contains(
            "CREATE NONCLUSTERED INDEX [IX_Reg_Code_Year_Lookup] ON [xsd].[Reg] ([Code], [Year]) INCLUDE ([RegId]);"
        ));
    }
}
