//! Relational model representation

use std::collections::HashMap;
use std::fmt;

use crate::util::eq_ci;

/// SQL Server column type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlType {
    /// `NVARCHAR(n)`; `None` renders as `NVARCHAR(MAX)`
    NVarChar(Option<u32>),
    /// `DECIMAL(p, s)`
    Decimal(u8, u8),
    Int,
    BigInt,
    SmallInt,
    TinyInt,
    Bit,
    Float,
    Real,
    Date,
    DateTime2,
    Time,
}

impl SqlType {
    pub fn is_nvarchar(&self) -> bool {
        matches!(self, SqlType::NVarChar(_))
    }

    pub fn is_nvarchar_max(&self) -> bool {
        matches!(self, SqlType::NVarChar(None))
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::NVarChar(Some(n)) => write!(f, "NVARCHAR({})", n),
            SqlType::NVarChar(None) => write!(f, "NVARCHAR(MAX)"),
            SqlType::Decimal(p, s) => write!(f, "DECIMAL({},{})", p, s),
            SqlType::Int => write!(f, "INT"),
            SqlType::BigInt => write!(f, "BIGINT"),
            SqlType::SmallInt => write!(f, "SMALLINT"),
            SqlType::TinyInt => write!(f, "TINYINT"),
            SqlType::Bit => write!(f, "BIT"),
            SqlType::Float => write!(f, "FLOAT"),
            SqlType::Real => write!(f, "REAL"),
            SqlType::Date => write!(f, "DATE"),
            SqlType::DateTime2 => write!(f, "DATETIME2"),
            SqlType::Time => write!(f, "TIME"),
        }
    }
}

/// A table column
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub sql_type: SqlType,
    pub nullable: bool,
    pub identity: bool,
    pub is_primary_key: bool,
}

impl Column {
    pub fn plain(name: &str, sql_type: SqlType, nullable: bool) -> Self {
        Self {
            name: name.to_string(),
            sql_type,
            nullable,
            identity: false,
            is_primary_key: false,
        }
    }
}

/// A single-column foreign key to the parent table's surrogate PK
#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub name: String,
    pub column_name: String,
    pub ref_schema: String,
    pub ref_table: String,
    pub ref_column: String,
}

/// A unique constraint over one or more columns (order preserved)
#[derive(Debug, Clone)]
pub struct UniqueConstraint {
    pub name: String,
    pub columns: Vec<String>,
}

/// A CHECK constraint bound to a single column
#[derive(Debug, Clone)]
pub struct CheckConstraint {
    pub name: String,
    pub column_name: String,
    /// Predicate text, already NULL-wrapped when the column is nullable
    pub expression: String,
}

/// Mapping from a global element's qualified XML name to its table
#[derive(Debug, Clone)]
pub struct ElementBinding {
    pub namespace: Option<String>,
    pub local_name: String,
    pub table_name: String,
}

/// A derived table
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub foreign_keys: Vec<ForeignKey>,
    pub uniques: Vec<UniqueConstraint>,
    pub checks: Vec<CheckConstraint>,
    /// Local names of `<choice>` branch children under this table's type;
    /// the importer uses these to bind the `ChoiceOption` discriminator
    pub choice_members: Vec<String>,
    /// Per-table counter feeding `CK_<Table>_<Col>_<n>` names
    check_counter: u32,
}

impl Table {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
            uniques: Vec::new(),
            checks: Vec::new(),
            choice_members: Vec::new(),
            check_counter: 0,
        }
    }

    /// Name of this table's surrogate primary key column
    pub fn pk_column(&self) -> String {
        format!("{}Id", self.name)
    }

    /// Case-insensitive column lookup
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| eq_ci(&c.name, name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Whether `column` is one of this table's FK columns
    pub fn is_fk_column(&self, column: &str) -> bool {
        self.foreign_keys.iter().any(|fk| eq_ci(&fk.column_name, column))
    }

    /// Ensure the identity PK column exists; it is always first.
    pub fn ensure_primary_key(&mut self) {
        let pk = self.pk_column();
        if self.has_column(&pk) {
            return;
        }
        self.columns.insert(
            0,
            Column {
                name: pk,
                sql_type: SqlType::Int,
                nullable: false,
                identity: true,
                is_primary_key: true,
            },
        );
    }

    /// Add a column, merging with an existing column of the same name:
    /// nullability relaxes only when both sides are nullable, and any
    /// conflicting NVARCHAR width widens to `NVARCHAR(MAX)`.
    pub fn add_or_merge_column(&mut self, column: Column) {
        if let Some(existing) = self
            .columns
            .iter_mut()
            .find(|c| eq_ci(&c.name, &column.name))
        {
            existing.nullable = existing.nullable && column.nullable;
            if existing.sql_type != column.sql_type
                && (existing.sql_type.is_nvarchar() || column.sql_type.is_nvarchar())
            {
                existing.sql_type = SqlType::NVarChar(None);
            }
            return;
        }
        self.columns.push(column);
    }

    /// Add a CHECK on `column` unless the same predicate is already present.
    /// Nullable columns get the `IS NULL OR (…)` wrapper here.
    pub fn add_check(&mut self, column: &str, predicate: String) {
        let nullable = self.column(column).map(|c| c.nullable).unwrap_or(true);
        let expression = if nullable {
            format!("[{}] IS NULL OR ({})", column, predicate)
        } else {
            predicate
        };
        if self.checks.iter().any(|c| c.expression == expression) {
            return;
        }
        self.check_counter += 1;
        self.checks.push(CheckConstraint {
            name: format!("CK_{}_{}_{}", self.name, column, self.check_counter),
            column_name: column.to_string(),
            expression,
        });
    }

    /// Add a UNIQUE constraint unless one with the same column set exists.
    pub fn add_unique(&mut self, columns: Vec<String>) {
        if columns.is_empty() {
            return;
        }
        if self.uniques.iter().any(|u| {
            u.columns.len() == columns.len()
                && u.columns.iter().zip(&columns).all(|(a, b)| eq_ci(a, b))
        }) {
            return;
        }
        let name = format!("UQ_{}_{}", self.name, columns.join("_"));
        self.uniques.push(UniqueConstraint { name, columns });
    }
}

/// The complete table model. Built once from the XSD and immutable
/// afterwards; importer workers read it concurrently.
#[derive(Debug, Clone)]
pub struct TableModel {
    /// Target schema for every table (e.g. `xsd`)
    pub schema: String,
    tables: Vec<Table>,
    /// Case-insensitive name -> index into `tables`
    index: HashMap<String, usize>,
    pub bindings: Vec<ElementBinding>,
}

impl TableModel {
    pub fn new(schema: &str) -> Self {
        Self {
            schema: schema.to_string(),
            tables: Vec::new(),
            index: HashMap::new(),
            bindings: Vec::new(),
        }
    }

    /// Tables in creation order
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.index.get(&name.to_ascii_lowercase()).map(|&i| &self.tables[i])
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.index.contains_key(&name.to_ascii_lowercase())
    }

    /// Look up a table mutably, creating it (with its PK) if missing.
    /// Returns the canonical table name.
    pub fn ensure_table(&mut self, name: &str) -> String {
        let key = name.to_ascii_lowercase();
        if let Some(&i) = self.index.get(&key) {
            return self.tables[i].name.clone();
        }
        let mut table = Table::new(name);
        table.ensure_primary_key();
        self.index.insert(key, self.tables.len());
        self.tables.push(table);
        name.to_string()
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        let key = name.to_ascii_lowercase();
        self.index.get(&key).map(|&i| &mut self.tables[i])
    }

    /// Register a global element binding
    pub fn bind_element(&mut self, namespace: Option<String>, local_name: &str, table: &str) {
        self.bindings.push(ElementBinding {
            namespace,
            local_name: local_name.to_string(),
            table_name: table.to_string(),
        });
    }

    /// Resolve a `(namespace, localName)` pair through the binding map
    pub fn binding(&self, namespace: Option<&str>, local_name: &str) -> Option<&ElementBinding> {
        self.bindings
            .iter()
            .find(|b| b.namespace.as_deref() == namespace && eq_ci(&b.local_name, local_name))
    }
}
