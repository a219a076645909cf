//! Batched loader
//!
//! Rows are buffered per relation while records are staged. Once the
//! number of staged records reaches the batch size, every buffered
//! relation is written in catalog order, so within a flush parents always
//! reach the destination before their children. A failed write aborts the
//! rest of the flush and is returned to the caller, which owns the
//! transaction.

use std::collections::BTreeMap;

use super::rows::StagedRow;
use crate::database::schema::{DatabaseSchema, TableDef};
use crate::database::{DatabaseBackend, Row, WriteMode};
use crate::error::{LoadError, LoadResult};

/// Buffered rows for one relation and write mode
#[derive(Debug)]
struct Pending {
    table: &'static TableDef,
    rows: Vec<Row>,
}

/// Per-relation row buffers with threshold flushing
#[derive(Debug)]
pub struct BatchLoader {
    batch_size: usize,
    /// Keyed by catalog position so iteration follows dependency order
    pending: BTreeMap<(usize, WriteMode), Pending>,
    staged_records: usize,
    flush_sizes: Vec<usize>,
    rows_written: BTreeMap<String, u64>,
}

impl BatchLoader {
    /// Create a loader flushing every `batch_size` records
    pub fn new(batch_size: usize) -> LoadResult<Self> {
        if batch_size == 0 {
            return Err(LoadError::Config(
                "batch size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            batch_size,
            pending: BTreeMap::new(),
            staged_records: 0,
            flush_sizes: Vec::new(),
            rows_written: BTreeMap::new(),
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Records staged since the last flush
    pub fn staged_records(&self) -> usize {
        self.staged_records
    }

    /// Record count of every flush so far
    pub fn flush_sizes(&self) -> &[usize] {
        &self.flush_sizes
    }

    /// Rows written per relation so far
    pub fn rows_written(&self) -> &BTreeMap<String, u64> {
        &self.rows_written
    }

    /// Buffer the rows of one record without flushing
    pub fn push(&mut self, rows: Vec<StagedRow>) -> LoadResult<()> {
        for staged in rows {
            let position = DatabaseSchema::position(staged.table.name).ok_or_else(|| {
                LoadError::Config(format!("\"{}\" is not a catalog table", staged.table.name))
            })?;
            self.pending
                .entry((position, staged.mode))
                .or_insert_with(|| Pending {
                    table: staged.table,
                    rows: Vec::new(),
                })
                .rows
                .push(staged.row);
        }
        self.staged_records += 1;
        Ok(())
    }

    /// Buffer the rows of one record, flushing when the threshold is reached
    ///
    /// # Returns
    /// Whether a flush happened
    pub async fn stage<B: DatabaseBackend>(
        &mut self,
        backend: &B,
        rows: Vec<StagedRow>,
    ) -> LoadResult<bool> {
        self.push(rows)?;
        if self.staged_records >= self.batch_size {
            self.flush(backend).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Write every buffered relation in catalog order
    pub async fn flush<B: DatabaseBackend>(&mut self, backend: &B) -> LoadResult<()> {
        let pending = std::mem::take(&mut self.pending);
        let records = std::mem::take(&mut self.staged_records);

        for ((_, mode), batch) in pending {
            let inserted = backend
                .write_batch(batch.table, mode, &batch.rows)
                .await
                .map_err(|e| {
                    tracing::error!("Flush failed on {}: {}", batch.table.name, e);
                    LoadError::from(e)
                })?;
            tracing::debug!(
                "Wrote {} of {} rows to {}",
                inserted,
                batch.rows.len(),
                batch.table.name
            );
            *self
                .rows_written
                .entry(batch.table.name.to_string())
                .or_default() += inserted;
        }

        tracing::info!("Flushed batch of {} records", records);
        self.flush_sizes.push(records);
        Ok(())
    }

    /// Flush whatever remains at end of stream
    pub async fn finish<B: DatabaseBackend>(&mut self, backend: &B) -> LoadResult<()> {
        if self.staged_records > 0 {
            self.flush(backend).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::tables;
    use crate::database::{MemoryBackend, SqlValue};

    async fn catalog() -> MemoryBackend {
        let backend = MemoryBackend::new();
        for table in DatabaseSchema::tables() {
            backend.create_table(table).await.unwrap();
        }
        backend
    }

    fn person(id: usize) -> Vec<StagedRow> {
        vec![StagedRow::insert(
            &tables::PERSONNE,
            vec![
                id.to_string().into(),
                SqlValue::Null,
                SqlValue::Null,
                SqlValue::Null,
                SqlValue::Null,
                SqlValue::Null,
            ],
        )]
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        assert!(matches!(BatchLoader::new(0), Err(LoadError::Config(_))));
    }

    #[tokio::test]
    async fn test_flushes_at_threshold_and_finishes_remainder() {
        let backend = catalog().await;
        let mut loader = BatchLoader::new(100).unwrap();

        for id in 0..250 {
            loader.stage(&backend, person(id)).await.unwrap();
        }
        loader.finish(&backend).await.unwrap();

        assert_eq!(loader.flush_sizes(), &[100, 100, 50]);
        assert_eq!(loader.rows_written().get("Personne"), Some(&250));
        assert_eq!(
            backend.batch_log(),
            vec![
                ("Personne".to_string(), 100),
                ("Personne".to_string(), 100),
                ("Personne".to_string(), 50),
            ]
        );
    }

    #[tokio::test]
    async fn test_finish_without_staged_records_is_noop() {
        let backend = catalog().await;
        let mut loader = BatchLoader::new(10).unwrap();
        loader.finish(&backend).await.unwrap();
        assert!(loader.flush_sizes().is_empty());
        assert!(backend.batch_log().is_empty());
    }

    #[tokio::test]
    async fn test_flush_follows_catalog_order() {
        let backend = catalog().await;
        let mut loader = BatchLoader::new(10).unwrap();

        // Child staged before its parent
        loader
            .push(vec![
                StagedRow::insert(
                    &tables::FILM_GENRE,
                    vec!["1".into(), "Drame".into()],
                ),
                StagedRow::if_absent(&tables::GENRE, vec!["Drame".into()]),
                StagedRow::insert(
                    &tables::FILM,
                    vec![
                        "1".into(),
                        SqlValue::Null,
                        SqlValue::Null,
                        SqlValue::Null,
                        SqlValue::Null,
                        SqlValue::Null,
                        SqlValue::Null,
                        SqlValue::Null,
                    ],
                ),
            ])
            .unwrap();
        loader.flush(&backend).await.unwrap();

        let order: Vec<String> = backend.batch_log().into_iter().map(|(t, _)| t).collect();
        assert_eq!(order, vec!["Genre", "Film", "FilmGenre"]);
    }

    #[tokio::test]
    async fn test_failed_write_stops_the_flush() {
        let backend = catalog().await;
        let mut loader = BatchLoader::new(10).unwrap();

        loader.push(person(1)).unwrap();
        loader.push(person(1)).unwrap();
        loader
            .push(vec![
                StagedRow::if_absent(&tables::GENRE, vec!["Drame".into()]),
                StagedRow::insert(&tables::SCENARISTE, vec!["1".into(), "Jo".into()]),
            ])
            .unwrap();

        let err = loader.flush(&backend).await.unwrap_err();
        assert!(matches!(err, LoadError::Constraint { .. }));
        // Genre precedes Personne in the catalog; Scenariste follows and is never written
        assert_eq!(
            backend.batch_log(),
            vec![("Genre".to_string(), 1), ("Personne".to_string(), 2)]
        );
        assert!(loader.flush_sizes().is_empty());
    }
}
