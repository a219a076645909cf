//! DuckDB database backend implementation
//!
//! Provides an embedded destination using DuckDB. Supports both file-based
//! persistence and in-memory mode.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::schema::{SqlDialect, TableDef};
use super::{DatabaseBackend, DatabaseError, DatabaseResult, Row, SqlValue, WriteMode};

/// DuckDB database backend
pub struct DuckDBBackend {
    /// Path to the database file (None for in-memory)
    db_path: Option<PathBuf>,
    /// DuckDB connection (wrapped in Mutex for thread safety)
    connection: Mutex<duckdb::Connection>,
}

impl DuckDBBackend {
    /// Create a new DuckDB backend with a file-based database
    ///
    /// # Arguments
    /// * `db_path` - Path to the DuckDB database file
    pub fn new(db_path: impl AsRef<Path>) -> DatabaseResult<Self> {
        let path = db_path.as_ref().to_path_buf();
        let connection = duckdb::Connection::open(&path).map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to open DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: Some(path),
            connection: Mutex::new(connection),
        })
    }

    /// Create an in-memory DuckDB backend
    pub fn in_memory() -> DatabaseResult<Self> {
        let connection = duckdb::Connection::open_in_memory().map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to create in-memory DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: None,
            connection: Mutex::new(connection),
        })
    }

    /// Open the database named by a configured path (`:memory:` for in-memory)
    pub fn open(path: &str) -> DatabaseResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::new(path)
        }
    }

    /// Get the database file path (None for in-memory)
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Check if this is an in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.db_path.is_none()
    }

    fn lock(&self) -> DatabaseResult<MutexGuard<'_, duckdb::Connection>> {
        self.connection
            .lock()
            .map_err(|e| DatabaseError::ConnectionFailed(format!("Lock error: {}", e)))
    }

    /// Execute multiple SQL statements
    fn execute_batch(&self, sql: &str) -> DatabaseResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(sql)
            .map_err(|e| DatabaseError::QueryFailed(format!("Batch execute failed: {}", e)))
    }

    /// Map a DuckDB error raised while touching `table`
    fn classify(table: &str, error: duckdb::Error) -> DatabaseError {
        let message = error.to_string();
        if message.contains("Constraint Error") {
            DatabaseError::ConstraintViolation {
                table: table.to_string(),
                message,
            }
        } else if message.contains("does not exist") {
            DatabaseError::RelationMissing(table.to_string())
        } else {
            DatabaseError::QueryFailed(message)
        }
    }

    /// Convert a bound value to a DuckDB value
    ///
    /// Dates and decimals travel as text and are cast by DuckDB against
    /// the declared column type.
    fn to_duckdb_value(value: &SqlValue) -> duckdb::types::Value {
        use duckdb::types::Value;

        match value {
            SqlValue::Null => Value::Null,
            SqlValue::Text(s) | SqlValue::Decimal(s) => Value::Text(s.clone()),
            SqlValue::Int(i) => Value::BigInt(*i),
            SqlValue::Date(d) => Value::Text(d.format("%Y-%m-%d").to_string()),
        }
    }
}

#[async_trait(?Send)]
impl DatabaseBackend for DuckDBBackend {
    async fn create_table(&self, table: &TableDef) -> DatabaseResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(&table.create_sql(SqlDialect::DuckDB))
            .map_err(|e| DatabaseError::QueryFailed(format!("{}: {}", table.name, e)))
    }

    async fn drop_table(&self, table: &TableDef) -> DatabaseResult<()> {
        let conn = self.lock()?;
        // A failed statement would abort an open transaction, so check first
        let exists: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
                [table.name],
                |row| row.get(0),
            )
            .map_err(|e| Self::classify(table.name, e))?;
        if exists == 0 {
            return Err(DatabaseError::RelationMissing(table.name.to_string()));
        }
        conn.execute_batch(&table.drop_sql(SqlDialect::DuckDB))
            .map_err(|e| Self::classify(table.name, e))
    }

    async fn begin(&self) -> DatabaseResult<()> {
        self.execute_batch("BEGIN TRANSACTION")
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))
    }

    async fn commit(&self) -> DatabaseResult<()> {
        self.execute_batch("COMMIT")
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))
    }

    async fn rollback(&self) -> DatabaseResult<()> {
        self.execute_batch("ROLLBACK")
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))
    }

    async fn write_batch(
        &self,
        table: &TableDef,
        mode: WriteMode,
        rows: &[Row],
    ) -> DatabaseResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&table.insert_sql(SqlDialect::DuckDB, mode))
            .map_err(|e| Self::classify(table.name, e))?;

        let mut inserted = 0u64;
        for row in rows {
            let values: Vec<duckdb::types::Value> =
                row.iter().map(Self::to_duckdb_value).collect();
            let affected = stmt
                .execute(duckdb::params_from_iter(values.iter()))
                .map_err(|e| Self::classify(table.name, e))?;
            inserted += affected as u64;
        }

        Ok(inserted)
    }

    async fn count_rows(&self, table: &TableDef) -> DatabaseResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(&table.count_sql(), [], |row| row.get(0))
            .map_err(|e| Self::classify(table.name, e))?;
        Ok(count.max(0) as u64)
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        let conn = self.lock()?;
        let one: i32 = conn
            .query_row("SELECT 1", [], |row| row.get(0))
            .map_err(|e| DatabaseError::QueryFailed(format!("Health check failed: {}", e)))?;
        Ok(one == 1)
    }

    fn backend_type(&self) -> &'static str {
        "duckdb"
    }

    async fn close(&self) -> DatabaseResult<()> {
        // The connection is closed when the backend is dropped
        Ok(())
    }
}
