//! SQL Server adapter over tiberius.
//!
//! One TCP connection per session; transactions are driven with explicit
//! `BEGIN TRANSACTION` / `COMMIT` / `ROLLBACK` batches, and inserts return
//! their identity through `SCOPE_IDENTITY()`.

use async_trait::async_trait;
use tiberius::{Client, ColumnData, Config, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::db::{sql, RowInsert, RowProbe, SqlConnector, SqlSession, SqlValue, TableRef};
use crate::error::{IngestResult, XsdIngestError};

impl ToSql for SqlValue {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            SqlValue::Text(s) => ColumnData::String(Some(s.as_str().into())),
            SqlValue::Int(i) => ColumnData::I64(Some(*i)),
            SqlValue::Float(f) => ColumnData::F64(Some(*f)),
            SqlValue::Bool(b) => ColumnData::Bit(Some(*b)),
            SqlValue::Null => ColumnData::String(None),
        }
    }
}

/// Opens tiberius sessions from an ADO-style connection string
pub struct MssqlConnector {
    connection_string: String,
}

impl MssqlConnector {
    pub fn new(connection_string: &str) -> Self {
        Self {
            connection_string: connection_string.to_string(),
        }
    }
}

#[async_trait]
impl SqlConnector for MssqlConnector {
    async fn connect(&self) -> IngestResult<Box<dyn SqlSession>> {
        let config = Config::from_ado_string(&self.connection_string)?;
        let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
            XsdIngestError::DatabaseError {
                message: format!("connect {}: {}", config.get_addr(), e),
            }
        })?;
        tcp.set_nodelay(true)
            .map_err(|e| XsdIngestError::DatabaseError {
                message: e.to_string(),
            })?;
        let client = Client::connect(config, tcp.compat_write()).await?;
        Ok(Box::new(MssqlSession { client }))
    }
}

pub struct MssqlSession {
    client: Client<Compat<TcpStream>>,
}

impl MssqlSession {
    fn params(values: &[SqlValue]) -> Vec<&dyn ToSql> {
        values.iter().map(|v| v as &dyn ToSql).collect()
    }

    async fn query_identity(
        &mut self,
        statement: &str,
        values: &[SqlValue],
    ) -> IngestResult<i32> {
        let params = Self::params(values);
        let row = self
            .client
            .query(statement, &params)
            .await?
            .into_row()
            .await?;
        let id: Option<i32> = row.as_ref().and_then(|r| r.get(0));
        id.ok_or_else(|| XsdIngestError::DatabaseError {
            message: "insert returned no identity value".to_string(),
        })
    }
}

#[async_trait]
impl SqlSession for MssqlSession {
    async fn begin(&mut self) -> IngestResult<()> {
        self.client.execute("BEGIN TRANSACTION;", &[]).await?;
        Ok(())
    }

    async fn commit(&mut self) -> IngestResult<()> {
        self.client.execute("COMMIT TRANSACTION;", &[]).await?;
        Ok(())
    }

    async fn rollback(&mut self) -> IngestResult<()> {
        self.client
            .execute("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION;", &[])
            .await?;
        Ok(())
    }

    async fn insert_row(&mut self, insert: &RowInsert) -> IngestResult<i32> {
        let statement = sql::render_insert(insert);
        self.query_identity(&statement, &insert.values).await
    }

    async fn insert_default_row(&mut self, table: &TableRef) -> IngestResult<i32> {
        let statement = sql::render_default_insert(table);
        self.query_identity(&statement, &[]).await
    }

    async fn find_existing(&mut self, probe: &RowProbe) -> IngestResult<Option<i32>> {
        let statement = sql::render_probe(probe);
        let params = Self::params(&probe.values);
        let row = self
            .client
            .query(statement.as_str(), &params)
            .await?
            .into_row()
            .await?;
        Ok(row.as_ref().and_then(|r| r.get(0)))
    }
}
