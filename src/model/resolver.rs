//! Resolution of XML element names to model tables during import.

use crate::model::identifiers::{sanitize, table_ident};
use crate::model::tables::{Table, TableModel};

/// Maps `(namespace, localName, parent table)` to a table, with the
/// fallbacks of the binding map, the direct element name, and the
/// `Parent_Child` compound name.
pub struct TableResolver<'a> {
    model: &'a TableModel,
}

impl<'a> TableResolver<'a> {
    pub fn new(model: &'a TableModel) -> Self {
        Self { model }
    }

    /// Resolve an element to its table, or `None` when no table matches.
    ///
    /// When both a direct-name table and a `Parent_Child` compound table
    /// exist, the one carrying a `<Parent>Id` column wins; that
    /// disambiguates elements appearing under multiple parents.
    pub fn resolve(
        &self,
        namespace: Option<&str>,
        local_name: &str,
        parent_table: Option<&str>,
    ) -> Option<&'a Table> {
        if let Some(binding) = self.model.binding(namespace, local_name) {
            if let Some(table) = self.model.table(&binding.table_name) {
                return Some(table);
            }
        }

        let direct = self.model.table(&table_ident(local_name));
        let compound = parent_table.and_then(|parent| {
            self.model
                .table(&table_ident(&format!("{}_{}", parent, sanitize(local_name))))
        });

        match (direct, compound, parent_table) {
            (Some(d), Some(c), Some(parent)) => {
                let fk = format!("{}Id", parent);
                if d.has_column(&fk) {
                    Some(d)
                } else if c.has_column(&fk) {
                    Some(c)
                } else {
                    Some(d)
                }
            }
            (Some(d), _, _) => Some(d),
            (None, c, _) => c,
        }
    }
}
