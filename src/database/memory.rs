//! In-memory database backend
//!
//! Keeps every catalog table as a vector of rows and enforces the same
//! constraints a relational destination would: primary keys, UNIQUE and
//! NOT NULL columns, and foreign keys. Transactions snapshot the tables on
//! `begin` and restore the snapshot on `rollback`.
//!
//! The backend is cheaply cloneable; clones share the same state, which
//! lets a caller keep a handle for inspection after handing one to the
//! orchestrator.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use super::schema::TableDef;
use super::{DatabaseBackend, DatabaseError, DatabaseResult, Row, SqlValue, WriteMode};

#[derive(Debug, Clone, Default)]
struct StoredTable {
    rows: Vec<Row>,
    keys: HashSet<Vec<SqlValue>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: BTreeMap<&'static str, StoredTable>,
    snapshot: Option<BTreeMap<&'static str, StoredTable>>,
    batches: Vec<(String, usize)>,
    closed: bool,
}

/// In-memory database backend
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    /// Create an empty in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> DatabaseResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| DatabaseError::ConnectionFailed(format!("Lock error: {}", e)))
    }

    /// Snapshot of the rows of a table, in insertion order
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock()
            .ok()
            .and_then(|state| state.tables.get(table).map(|t| t.rows.clone()))
            .unwrap_or_default()
    }

    /// Names of the tables that currently exist
    pub fn table_names(&self) -> Vec<String> {
        self.lock()
            .map(|state| state.tables.keys().map(|k| k.to_string()).collect())
            .unwrap_or_default()
    }

    /// Every batch written so far, as `(table, row count)` in write order
    pub fn batch_log(&self) -> Vec<(String, usize)> {
        self.lock()
            .map(|state| state.batches.clone())
            .unwrap_or_default()
    }

    /// Whether a transaction is open
    pub fn in_transaction(&self) -> bool {
        self.lock()
            .map(|state| state.snapshot.is_some())
            .unwrap_or(false)
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.lock().map(|state| state.closed).unwrap_or(false)
    }
}

fn violation(table: &TableDef, message: String) -> DatabaseError {
    DatabaseError::ConstraintViolation {
        table: table.name.to_string(),
        message,
    }
}

/// Reject rows whose width does not match the table
fn check_arity(table: &TableDef, row: &Row) -> DatabaseResult<()> {
    if row.len() != table.columns.len() {
        return Err(DatabaseError::QueryFailed(format!(
            "{}: expected {} values, got {}",
            table.name,
            table.columns.len(),
            row.len()
        )));
    }
    Ok(())
}

/// Check one row against the constraints of its table
fn check_row(
    state: &MemoryState,
    table: &TableDef,
    stored: &StoredTable,
    row: &Row,
) -> DatabaseResult<()> {
    for (column, value) in table.columns.iter().zip(row.iter()) {
        let in_key = table.primary_key.contains(&column.name);
        if (column.required || in_key) && value.is_null() {
            return Err(violation(
                table,
                format!("NOT NULL constraint failed: {}", column.name),
            ));
        }
    }

    for (i, column) in table.columns.iter().enumerate() {
        if !column.unique || row[i].is_null() {
            continue;
        }
        if stored.rows.iter().any(|existing| existing[i] == row[i]) {
            return Err(violation(
                table,
                format!("UNIQUE constraint failed: {}", column.name),
            ));
        }
    }

    for fk in table.foreign_keys {
        let values: Vec<SqlValue> = fk
            .columns
            .iter()
            .filter_map(|c| table.column_index(c).map(|i| row[i].clone()))
            .collect();
        if values.iter().any(SqlValue::is_null) {
            continue;
        }
        let present = state
            .tables
            .get(fk.references)
            .is_some_and(|parent| parent.keys.contains(&values));
        if !present {
            return Err(violation(
                table,
                format!(
                    "FOREIGN KEY constraint {} failed: no {} row for {:?}",
                    fk.name, fk.references, values
                ),
            ));
        }
    }

    Ok(())
}

#[async_trait(?Send)]
impl DatabaseBackend for MemoryBackend {
    async fn create_table(&self, table: &TableDef) -> DatabaseResult<()> {
        let mut state = self.lock()?;
        if state.tables.contains_key(table.name) {
            return Err(DatabaseError::QueryFailed(format!(
                "Table \"{}\" already exists",
                table.name
            )));
        }
        state.tables.insert(table.name, StoredTable::default());
        Ok(())
    }

    async fn drop_table(&self, table: &TableDef) -> DatabaseResult<()> {
        let mut state = self.lock()?;
        state
            .tables
            .remove(table.name)
            .map(|_| ())
            .ok_or_else(|| DatabaseError::RelationMissing(table.name.to_string()))
    }

    async fn begin(&self) -> DatabaseResult<()> {
        let mut state = self.lock()?;
        if state.snapshot.is_some() {
            return Err(DatabaseError::TransactionFailed(
                "A transaction is already open".to_string(),
            ));
        }
        state.snapshot = Some(state.tables.clone());
        Ok(())
    }

    async fn commit(&self) -> DatabaseResult<()> {
        let mut state = self.lock()?;
        state
            .snapshot
            .take()
            .map(|_| ())
            .ok_or_else(|| DatabaseError::TransactionFailed("No open transaction".to_string()))
    }

    async fn rollback(&self) -> DatabaseResult<()> {
        let mut state = self.lock()?;
        let snapshot = state
            .snapshot
            .take()
            .ok_or_else(|| DatabaseError::TransactionFailed("No open transaction".to_string()))?;
        state.tables = snapshot;
        Ok(())
    }

    async fn write_batch(
        &self,
        table: &TableDef,
        mode: WriteMode,
        rows: &[Row],
    ) -> DatabaseResult<u64> {
        let mut state = self.lock()?;
        if !state.tables.contains_key(table.name) {
            return Err(DatabaseError::RelationMissing(table.name.to_string()));
        }
        state.batches.push((table.name.to_string(), rows.len()));

        let key_indices = table.primary_key_indices();
        let mut inserted = 0u64;

        for row in rows {
            check_arity(table, row)?;
            let key: Vec<SqlValue> = key_indices.iter().map(|&i| row[i].clone()).collect();

            let stored = state
                .tables
                .get(table.name)
                .ok_or_else(|| DatabaseError::RelationMissing(table.name.to_string()))?;

            if stored.keys.contains(&key) {
                match mode {
                    WriteMode::InsertIfAbsent => continue,
                    WriteMode::Insert => {
                        return Err(violation(
                            table,
                            format!("PRIMARY KEY constraint failed: duplicate key {:?}", key),
                        ));
                    }
                }
            }

            check_row(&state, table, stored, row)?;

            if let Some(stored) = state.tables.get_mut(table.name) {
                stored.keys.insert(key);
                stored.rows.push(row.clone());
                inserted += 1;
            }
        }

        Ok(inserted)
    }

    async fn count_rows(&self, table: &TableDef) -> DatabaseResult<u64> {
        let state = self.lock()?;
        state
            .tables
            .get(table.name)
            .map(|t| t.rows.len() as u64)
            .ok_or_else(|| DatabaseError::RelationMissing(table.name.to_string()))
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        Ok(!self.lock()?.closed)
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn close(&self) -> DatabaseResult<()> {
        self.lock()?.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseSchema;
    use crate::database::schema::tables;

    async fn catalog() -> MemoryBackend {
        let backend = MemoryBackend::new();
        for table in DatabaseSchema::tables() {
            backend.create_table(table).await.unwrap();
        }
        backend
    }

    fn film(id: &str, director: Option<&str>) -> Row {
        vec![
            SqlValue::from(id),
            SqlValue::from("Fargo"),
            SqlValue::Int(1996),
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::from(director),
        ]
    }

    #[tokio::test]
    async fn test_drop_missing_table() {
        let backend = MemoryBackend::new();
        let err = backend.drop_table(&tables::FILM).await.unwrap_err();
        assert!(matches!(err, DatabaseError::RelationMissing(name) if name == "Film"));
    }

    #[tokio::test]
    async fn test_primary_key_enforced() {
        let backend = catalog().await;
        backend
            .write_batch(&tables::GENRE, WriteMode::Insert, &[vec!["Drame".into()]])
            .await
            .unwrap();
        let err = backend
            .write_batch(&tables::GENRE, WriteMode::Insert, &[vec!["Drame".into()]])
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation { .. }));

        let inserted = backend
            .write_batch(
                &tables::GENRE,
                WriteMode::InsertIfAbsent,
                &[vec!["Drame".into()], vec!["Horreur".into()]],
            )
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(backend.count_rows(&tables::GENRE).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_short_row_rejected() {
        let backend = catalog().await;
        let err = backend
            .write_batch(&tables::GENRE, WriteMode::Insert, &[vec![]])
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::QueryFailed(_)));

        let err = backend
            .write_batch(&tables::FILM, WriteMode::Insert, &[vec!["1".into()]])
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::QueryFailed(_)));
        assert_eq!(backend.count_rows(&tables::FILM).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_foreign_key_enforced() {
        let backend = catalog().await;

        let err = backend
            .write_batch(&tables::FILM, WriteMode::Insert, &[film("1", Some("9"))])
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation { .. }));

        // A null reference is not checked
        backend
            .write_batch(&tables::FILM, WriteMode::Insert, &[film("1", None)])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_not_null_and_unique_enforced() {
        let backend = catalog().await;

        let err = backend
            .write_batch(
                &tables::SCENARISTE,
                WriteMode::Insert,
                &[vec!["1".into(), SqlValue::Null]],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation { .. }));

        backend
            .write_batch(
                &tables::SCENARISTE,
                WriteMode::Insert,
                &[vec!["1".into(), "Joel Coen".into()]],
            )
            .await
            .unwrap();
        let err = backend
            .write_batch(
                &tables::SCENARISTE,
                WriteMode::Insert,
                &[vec!["2".into(), "Joel Coen".into()]],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation { .. }));
    }

    #[tokio::test]
    async fn test_rollback_restores_snapshot() {
        let backend = catalog().await;
        let handle = backend.clone();

        backend.begin().await.unwrap();
        assert!(handle.in_transaction());
        backend
            .write_batch(&tables::GENRE, WriteMode::Insert, &[vec!["Drame".into()]])
            .await
            .unwrap();
        backend.rollback().await.unwrap();

        assert!(!handle.in_transaction());
        assert!(handle.rows("Genre").is_empty());
        assert_eq!(handle.batch_log(), vec![("Genre".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_commit_without_transaction_fails() {
        let backend = MemoryBackend::new();
        assert!(backend.commit().await.is_err());
        backend.begin().await.unwrap();
        assert!(backend.begin().await.is_err());
        backend.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_marks_unhealthy() {
        let backend = MemoryBackend::new();
        assert!(backend.health_check().await.unwrap());
        backend.close().await.unwrap();
        assert!(backend.is_closed());
        assert!(!backend.health_check().await.unwrap());
        assert_eq!(backend.backend_type(), "memory");
    }
}
