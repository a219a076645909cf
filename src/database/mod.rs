//! Destination abstraction for the bulk loader
//!
//! This module provides the relational destination the loader writes into:
//! - DuckDB: Embedded database, file-based or in-memory
//! - PostgreSQL: For server deployments
//! - Memory: In-process tables with constraint checking, for dry runs and tests
//!
//! Every backend speaks the same small vocabulary: create/drop a catalog
//! table, open/commit/roll back a transaction, and write a batch of rows
//! either unconditionally or only when the primary key is not yet present.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[cfg(feature = "duckdb-backend")]
pub mod duckdb;

#[cfg(feature = "postgres-backend")]
pub mod postgres;

pub mod memory;
pub mod schema;

#[cfg(feature = "duckdb-backend")]
pub use self::duckdb::DuckDBBackend;

#[cfg(feature = "postgres-backend")]
pub use self::postgres::PostgresBackend;

pub use memory::MemoryBackend;
pub use schema::{ColumnDef, ColumnType, DatabaseSchema, ForeignKeyDef, SqlDialect, TableDef};

/// Error type for database operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Statement execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// The relation does not exist
    #[error("Relation \"{0}\" does not exist")]
    RelationMissing(String),

    /// A primary key, unique, not-null or foreign key constraint was violated
    #[error("Constraint violation on \"{table}\": {message}")]
    ConstraintViolation { table: String, message: String },

    /// Transaction failed
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

/// Result type for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// A single bound value
///
/// Values are bound against the column type declared in the catalog, so a
/// `Null` still reaches strictly typed drivers with the right type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Text(String),
    Int(i64),
    Date(NaiveDate),
    /// Fixed-point number in its canonical text form, e.g. `"0.00"`
    Decimal(String),
}

impl SqlValue {
    /// Check if the value is SQL NULL
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Text content, if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(value: NaiveDate) -> Self {
        SqlValue::Date(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One row, with values in the column order of its [`TableDef`]
pub type Row = Vec<SqlValue>;

/// How a batch of rows is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WriteMode {
    /// Plain insert; a key conflict is a constraint violation
    Insert,
    /// Insert only rows whose primary key is not already present
    InsertIfAbsent,
}

/// Destination backend trait for schema and load operations
///
/// All operations are async so that network backends (PostgreSQL) and
/// embedded ones (DuckDB, memory) share one interface. The loader is the
/// sole writer and awaits every call before issuing the next one.
#[async_trait(?Send)]
pub trait DatabaseBackend: Send + Sync {
    /// Create one catalog table with all of its constraints
    async fn create_table(&self, table: &TableDef) -> DatabaseResult<()>;

    /// Drop one catalog table
    ///
    /// Returns [`DatabaseError::RelationMissing`] when the table does not exist.
    async fn drop_table(&self, table: &TableDef) -> DatabaseResult<()>;

    /// Open a transaction
    async fn begin(&self) -> DatabaseResult<()>;

    /// Commit the open transaction
    async fn commit(&self) -> DatabaseResult<()>;

    /// Roll back the open transaction
    async fn rollback(&self) -> DatabaseResult<()>;

    /// Write a batch of rows into one table
    ///
    /// # Returns
    /// Number of rows actually inserted (conditional inserts may insert fewer)
    async fn write_batch(
        &self,
        table: &TableDef,
        mode: WriteMode,
        rows: &[Row],
    ) -> DatabaseResult<u64>;

    /// Count the rows of a table
    async fn count_rows(&self, table: &TableDef) -> DatabaseResult<u64>;

    /// Check if database is healthy and accessible
    async fn health_check(&self) -> DatabaseResult<bool>;

    /// Get the database backend type name
    fn backend_type(&self) -> &'static str;

    /// Close the database connection
    async fn close(&self) -> DatabaseResult<()>;
}

/// Tabular result for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names
    pub columns: Vec<String>,
    /// Rows of data
    pub rows: Vec<serde_json::Value>,
}

impl QueryResult {
    /// Create a new query result
    pub fn new(columns: Vec<String>, rows: Vec<serde_json::Value>) -> Self {
        Self { columns, rows }
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Count rows in every catalog table, in creation order
pub async fn table_counts<B: DatabaseBackend>(backend: &B) -> DatabaseResult<QueryResult> {
    let mut rows = Vec::new();
    for table in DatabaseSchema::tables() {
        let count = backend.count_rows(table).await?;
        rows.push(serde_json::json!({ "table": table.name, "rows": count }));
    }
    Ok(QueryResult::new(
        vec!["table".to_string(), "rows".to_string()],
        rows,
    ))
}

/// Output format for tabular results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Format a tabular result for display
pub fn format_query_result(result: &QueryResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&result.rows).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Csv => format_as_csv(result),
        OutputFormat::Table => format_as_table(result),
    }
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn format_as_csv(result: &QueryResult) -> String {
    let mut output = String::new();

    output.push_str(&result.columns.join(","));
    output.push('\n');

    for row in &result.rows {
        let values: Vec<String> = result
            .columns
            .iter()
            .map(|col| match row.get(col).unwrap_or(&serde_json::Value::Null) {
                serde_json::Value::String(s) => {
                    if s.contains(',') || s.contains('"') || s.contains('\n') {
                        format!("\"{}\"", s.replace('"', "\"\""))
                    } else {
                        s.clone()
                    }
                }
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            })
            .collect();
        output.push_str(&values.join(","));
        output.push('\n');
    }

    output
}

fn format_as_table(result: &QueryResult) -> String {
    if result.is_empty() {
        return "(0 rows)".to_string();
    }

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.len()).collect();
    for row in &result.rows {
        for (i, col) in result.columns.iter().enumerate() {
            let len = cell_text(row.get(col).unwrap_or(&serde_json::Value::Null))
                .chars()
                .count();
            widths[i] = widths[i].max(len);
        }
    }

    let mut output = String::new();

    let header: Vec<String> = result
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{:width$}", c, width = widths[i]))
        .collect();
    output.push_str(&header.join(" | "));
    output.push('\n');

    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&separator.join("-+-"));
    output.push('\n');

    for row in &result.rows {
        let values: Vec<String> = result
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let s = cell_text(row.get(col).unwrap_or(&serde_json::Value::Null));
                format!("{:width$}", s, width = widths[i])
            })
            .collect();
        output.push_str(&values.join(" | "));
        output.push('\n');
    }

    output.push_str(&format!("({} rows)", result.row_count()));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(
            OutputFormat::from_str("table").unwrap(),
            OutputFormat::Table
        );
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("csv").unwrap(), OutputFormat::Csv);
        assert!(OutputFormat::from_str("yaml").is_err());
    }

    #[test]
    fn test_sql_value_from_option() {
        assert_eq!(SqlValue::from(None::<String>), SqlValue::Null);
        assert_eq!(
            SqlValue::from(Some("Canada".to_string())),
            SqlValue::Text("Canada".to_string())
        );
        assert_eq!(SqlValue::from(Some(1999_i64)), SqlValue::Int(1999));
        assert!(SqlValue::Null.is_null());
    }

    #[test]
    fn test_format_as_table() {
        let result = QueryResult::new(
            vec!["table".to_string(), "rows".to_string()],
            vec![
                serde_json::json!({"table": "Personne", "rows": 250}),
                serde_json::json!({"table": "Film", "rows": 12}),
            ],
        );

        let output = format_as_table(&result);
        assert!(output.contains("Personne"));
        assert!(output.contains("250"));
        assert!(output.contains("(2 rows)"));
    }

    #[test]
    fn test_format_as_csv_quotes_commas() {
        let result = QueryResult::new(
            vec!["table".to_string(), "note".to_string()],
            vec![serde_json::json!({"table": "Film", "note": "a, b"})],
        );

        let output = format_as_csv(&result);
        assert!(output.starts_with("table,note\n"));
        assert!(output.contains("\"a, b\""));
    }
}
