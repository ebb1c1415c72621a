//! In-memory adapter with the same transactional semantics as the SQL
//! Server adapter: snapshot on begin, restore on rollback, NULL-safe
//! probes. Backs the test suite and `--connection memory:` dry runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::db::{RowInsert, RowProbe, SqlConnector, SqlSession, SqlValue, TableRef};
use crate::error::{IngestResult, XsdIngestError};
use crate::util::eq_ci;

/// One stored row: column name -> value
pub type MemRow = HashMap<String, SqlValue>;

#[derive(Debug, Clone, Default)]
struct MemTable {
    next_id: i32,
    rows: Vec<MemRow>,
}

/// The whole store; cloneable so sessions can snapshot it
#[derive(Debug, Clone, Default)]
pub struct MemoryDb {
    tables: HashMap<String, MemTable>,
}

impl MemoryDb {
    fn key(table: &TableRef) -> String {
        format!("{}.{}", table.schema, table.table).to_ascii_lowercase()
    }

    fn table_mut(&mut self, table: &TableRef) -> &mut MemTable {
        self.tables.entry(Self::key(table)).or_default()
    }

    fn insert(&mut self, table: &TableRef, mut row: MemRow) -> i32 {
        let pk_column = table.pk_column.clone();
        let t = self.table_mut(table);
        t.next_id += 1;
        row.insert(pk_column, SqlValue::Int(t.next_id as i64));
        t.rows.push(row);
        t.next_id
    }

    fn find(&self, table: &TableRef, columns: &[String], values: &[SqlValue]) -> Option<i32> {
        let t = self.tables.get(&Self::key(table))?;
        for row in &t.rows {
            let matches = columns.iter().zip(values).all(|(column, value)| {
                let stored = row
                    .iter()
                    .find(|(name, _)| eq_ci(name, column))
                    .map(|(_, v)| v)
                    .unwrap_or(&SqlValue::Null);
                stored == value
            });
            if matches {
                if let Some(SqlValue::Int(id)) = row
                    .iter()
                    .find(|(name, _)| eq_ci(name, &table.pk_column))
                    .map(|(_, v)| v)
                {
                    return Some(*id as i32);
                }
            }
        }
        None
    }
}

/// Shared handle used by tests to seed and inspect the store
#[derive(Clone, Default)]
pub struct MemoryConnector {
    db: Arc<Mutex<MemoryDb>>,
    /// Fault injection: sessions fail once this many inserts have run
    fail_after_inserts: Option<u32>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector whose sessions fail on the insert after `n` successes.
    /// Exercises rollback paths without a real database.
    pub fn failing_after(n: u32) -> Self {
        Self {
            db: Arc::default(),
            fail_after_inserts: Some(n),
        }
    }

    /// Rows currently in `schema.table`
    pub fn row_count(&self, schema: &str, table: &str) -> usize {
        let key = format!("{}.{}", schema, table).to_ascii_lowercase();
        self.db
            .lock()
            .expect("memory db lock")
            .tables
            .get(&key)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }

    /// Clone of the stored rows for `schema.table`
    pub fn rows(&self, schema: &str, table: &str) -> Vec<MemRow> {
        let key = format!("{}.{}", schema, table).to_ascii_lowercase();
        self.db
            .lock()
            .expect("memory db lock")
            .tables
            .get(&key)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SqlConnector for MemoryConnector {
    async fn connect(&self) -> IngestResult<Box<dyn SqlSession>> {
        Ok(Box::new(MemorySession {
            db: Arc::clone(&self.db),
            snapshot: None,
            fail_after_inserts: self.fail_after_inserts,
            inserts: 0,
        }))
    }
}

pub struct MemorySession {
    db: Arc<Mutex<MemoryDb>>,
    snapshot: Option<MemoryDb>,
    fail_after_inserts: Option<u32>,
    inserts: u32,
}

impl MemorySession {
    fn check_fault(&mut self) -> IngestResult<()> {
        if let Some(limit) = self.fail_after_inserts {
            if self.inserts >= limit {
                return Err(XsdIngestError::DatabaseError {
                    message: "injected fault".to_string(),
                });
            }
        }
        self.inserts += 1;
        Ok(())
    }
}

#[async_trait]
impl SqlSession for MemorySession {
    async fn begin(&mut self) -> IngestResult<()> {
        let db = self.db.lock().expect("memory db lock");
        self.snapshot = Some(db.clone());
        Ok(())
    }

    async fn commit(&mut self) -> IngestResult<()> {
        self.snapshot = None;
        Ok(())
    }

    async fn rollback(&mut self) -> IngestResult<()> {
        if let Some(snapshot) = self.snapshot.take() {
            *self.db.lock().expect("memory db lock") = snapshot;
        }
        Ok(())
    }

    async fn insert_row(&mut self, insert: &RowInsert) -> IngestResult<i32> {
        self.check_fault()?;
        let row: MemRow = insert
            .columns
            .iter()
            .cloned()
            .zip(insert.values.iter().cloned())
            .collect();
        Ok(self.db.lock().expect("memory db lock").insert(&insert.table, row))
    }

    async fn insert_default_row(&mut self, table: &TableRef) -> IngestResult<i32> {
        self.check_fault()?;
        Ok(self
            .db
            .lock()
            .expect("memory db lock")
            .insert(table, MemRow::new()))
    }

    async fn find_existing(&mut self, probe: &RowProbe) -> IngestResult<Option<i32>> {
        Ok(self
            .db
            .lock()
            .expect("memory db lock")
            .find(&probe.table, &probe.columns, &probe.values))
    }
}
