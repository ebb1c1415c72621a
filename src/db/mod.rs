//! Database session seam.
//!
//! The importer issues structured row commands through [`SqlSession`];
//! adapters turn them into their backend's dialect. The production adapter
//! speaks TDS to SQL Server ([`mssql`]); the in-memory adapter ([`memory`])
//! backs tests and dry runs with the same transactional semantics.

pub mod memory;
pub mod mssql;
pub mod sql;

use async_trait::async_trait;

use crate::error::IngestResult;

/// A parameter value bound into an insert or probe
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

/// A `[schema].[table]` reference plus its surrogate PK column
#[derive(Debug, Clone)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
    pub pk_column: String,
}

/// A parameterized single-row insert
#[derive(Debug, Clone)]
pub struct RowInsert {
    pub table: TableRef,
    pub columns: Vec<String>,
    pub values: Vec<SqlValue>,
}

/// A NULL-safe equality probe over a column set; matches return the PK of
/// the first matching row.
#[derive(Debug, Clone)]
pub struct RowProbe {
    pub table: TableRef,
    pub columns: Vec<String>,
    pub values: Vec<SqlValue>,
}

/// One database session; an import transaction lives entirely inside it.
#[async_trait]
pub trait SqlSession: Send {
    async fn begin(&mut self) -> IngestResult<()>;
    async fn commit(&mut self) -> IngestResult<()>;
    async fn rollback(&mut self) -> IngestResult<()>;

    /// Insert a row and return its identity PK value
    async fn insert_row(&mut self, insert: &RowInsert) -> IngestResult<i32>;

    /// Insert an all-defaults row and return its identity PK value
    async fn insert_default_row(&mut self, table: &TableRef) -> IngestResult<i32>;

    /// Return the PK of the first row matching the probe, if any
    async fn find_existing(&mut self, probe: &RowProbe) -> IngestResult<Option<i32>>;
}

/// Opens sessions; one per imported file.
#[async_trait]
pub trait SqlConnector: Send + Sync {
    async fn connect(&self) -> IngestResult<Box<dyn SqlSession>>;
}
