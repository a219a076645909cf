//! Load orchestration
//!
//! Runs the phases of a load plan strictly one after another against a
//! single destination. Each phase streams one source file, stages its
//! records through the batch loader and commits as one transaction. A
//! failed phase is rolled back and reported with the number of records it
//! got through; whether the run goes on is decided by the configured
//! [`FailurePolicy`].

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::Phase;
use super::batch::BatchLoader;
use super::registry::ReferenceRegistry;
use super::rows::{MappingContext, ToRows};
use crate::config::{FailurePolicy, LoadSection};
use crate::database::{DatabaseBackend, DatabaseError, DatabaseSchema};
use crate::error::{LoadError, LoadResult, PhaseFailure};
use crate::import::{RecordReader, XmlRecord};
use crate::models::{Client, Film, Person};
use crate::validation::validate_catalog;

/// Settings that shape a load run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    pub batch_size: usize,
    pub max_copies: u32,
    pub on_phase_failure: FailurePolicy,
    pub seed: Option<u64>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::from(&LoadSection::default())
    }
}

impl From<&LoadSection> for LoadOptions {
    fn from(section: &LoadSection) -> Self {
        Self {
            batch_size: section.batch_size,
            max_copies: section.max_copies,
            on_phase_failure: section.on_phase_failure,
            seed: section.seed,
        }
    }
}

/// Sources to load, and whether to reset the schema first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadPlan {
    reset: bool,
    sources: Vec<(Phase, PathBuf)>,
}

impl LoadPlan {
    /// Create an empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan phases in exactly the given order
    pub fn custom(sources: Vec<(Phase, PathBuf)>) -> Self {
        Self {
            reset: false,
            sources,
        }
    }

    pub fn people(self, path: impl Into<PathBuf>) -> Self {
        self.with_source(Phase::People, path.into())
    }

    pub fn films(self, path: impl Into<PathBuf>) -> Self {
        self.with_source(Phase::Films, path.into())
    }

    pub fn clients(self, path: impl Into<PathBuf>) -> Self {
        self.with_source(Phase::Clients, path.into())
    }

    /// Drop and recreate the schema before the first phase
    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    /// Add a source, keeping phases in dependency order
    fn with_source(mut self, phase: Phase, path: PathBuf) -> Self {
        self.sources.retain(|(existing, _)| *existing != phase);
        self.sources.push((phase, path));
        self.sources.sort_by_key(|(phase, _)| *phase);
        self
    }

    pub fn reset(&self) -> bool {
        self.reset
    }

    pub fn sources(&self) -> &[(Phase, PathBuf)] {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Outcome of one committed phase
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseReport {
    pub phase: Phase,
    /// Source the records were read from
    pub source: String,
    /// Records staged and committed
    pub loaded: usize,
    /// Records without a usable id, or cut off by the end of the stream
    pub skipped: usize,
    /// Records per flush, in order
    pub flush_sizes: Vec<usize>,
    /// Rows written per relation
    pub rows_written: BTreeMap<String, u64>,
    /// Copies generated per film id
    pub copies_per_film: BTreeMap<i64, u32>,
    #[serde(skip)]
    pub duration: Duration,
}

impl PhaseReport {
    /// Get records per second throughput
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.loaded as f64 / secs
        }
    }

    /// Format duration as human-readable string
    pub fn duration_string(&self) -> String {
        let secs = self.duration.as_secs();
        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }

    /// Total rows written across relations
    pub fn total_rows(&self) -> u64 {
        self.rows_written.values().sum()
    }
}

/// Outcome of a load run
#[derive(Debug)]
pub struct LoadSummary {
    pub run_id: Uuid,
    /// Whether the schema was reset first
    pub reset: bool,
    /// Committed phases in run order
    pub reports: Vec<PhaseReport>,
    /// Phases that were rolled back
    pub failures: Vec<PhaseFailure>,
}

impl LoadSummary {
    fn new(run_id: Uuid, reset: bool) -> Self {
        Self {
            run_id,
            reset,
            reports: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total_loaded(&self) -> usize {
        self.reports.iter().map(|r| r.loaded).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.reports.iter().map(|r| r.skipped).sum()
    }

    /// Report of a committed phase
    pub fn report(&self, phase: Phase) -> Option<&PhaseReport> {
        self.reports.iter().find(|r| r.phase == phase)
    }
}

/// Sequences load phases over one destination
///
/// The orchestrator owns the backend for the whole run. Call
/// [`Orchestrator::shutdown`] (or use [`Orchestrator::run_and_shutdown`])
/// so a transaction left open by an error is rolled back before the
/// backend is closed.
pub struct Orchestrator<B: DatabaseBackend> {
    backend: B,
    options: LoadOptions,
    registry: ReferenceRegistry,
    rng: StdRng,
    in_transaction: bool,
    run_id: Uuid,
}

impl<B: DatabaseBackend> Orchestrator<B> {
    /// Create an orchestrator over a connected backend
    pub fn new(backend: B, options: LoadOptions) -> LoadResult<Self> {
        if options.batch_size == 0 {
            return Err(LoadError::Config(
                "batch size must be at least 1".to_string(),
            ));
        }
        if options.max_copies == 0 {
            return Err(LoadError::Config(
                "max copies must be at least 1".to_string(),
            ));
        }

        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            backend,
            options,
            registry: ReferenceRegistry::new(),
            rng,
            in_transaction: false,
            run_id: Uuid::new_v4(),
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Reference keys seen by committed phases
    pub fn registry(&self) -> &ReferenceRegistry {
        &self.registry
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Verify the destination answers
    pub async fn check_connection(&self) -> LoadResult<()> {
        match self.backend.health_check().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(LoadError::Connectivity(format!(
                "{} health check failed",
                self.backend.backend_type()
            ))),
            Err(e) => Err(LoadError::Connectivity(e.to_string())),
        }
    }

    async fn begin(&mut self) -> LoadResult<()> {
        self.backend.begin().await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> LoadResult<()> {
        self.backend.commit().await?;
        self.in_transaction = false;
        Ok(())
    }

    /// Roll back the open transaction, logging rather than returning failures
    async fn rollback(&mut self) {
        if !self.in_transaction {
            return;
        }
        self.in_transaction = false;
        if let Err(e) = self.backend.rollback().await {
            tracing::error!("Rollback failed: {}", e);
        }
    }

    /// Drop every relation in reverse order and recreate the catalog
    ///
    /// Runs in one transaction. A relation that does not exist is skipped;
    /// any other failure rolls back the whole reset.
    pub async fn reset_schema(&mut self) -> LoadResult<()> {
        validate_catalog(DatabaseSchema::tables())?;

        tracing::info!("Resetting schema");
        self.begin().await?;
        if let Err(e) = self.rebuild_schema().await {
            tracing::error!("Schema reset failed: {}", e);
            self.rollback().await;
            return Err(e);
        }
        self.commit().await?;

        self.registry = ReferenceRegistry::new();
        tracing::info!(
            "Schema reset: {} tables created",
            DatabaseSchema::tables().len()
        );
        Ok(())
    }

    async fn rebuild_schema(&mut self) -> LoadResult<()> {
        for table in DatabaseSchema::tables_for_drop() {
            match self.backend.drop_table(table).await {
                Ok(()) => tracing::debug!("Dropped {}", table.name),
                Err(DatabaseError::RelationMissing(_)) => {
                    tracing::warn!("Table {} does not exist, nothing to drop", table.name);
                }
                Err(source) => {
                    return Err(LoadError::Schema {
                        table: table.name.to_string(),
                        source,
                    });
                }
            }
        }

        for table in DatabaseSchema::tables() {
            self.backend
                .create_table(table)
                .await
                .map_err(|source| LoadError::Schema {
                    table: table.name.to_string(),
                    source,
                })?;
            tracing::debug!("Created {}", table.name);
        }
        Ok(())
    }

    /// Load one source file as one phase
    pub async fn load_phase(
        &mut self,
        phase: Phase,
        path: &Path,
    ) -> Result<PhaseReport, PhaseFailure> {
        let file = File::open(path).map_err(|e| PhaseFailure {
            phase,
            processed: 0,
            error: LoadError::Io(format!("Failed to open {}: {}", path.display(), e)),
        })?;
        self.load_source(phase, &path.display().to_string(), BufReader::new(file))
            .await
    }

    /// Load one phase from any buffered source
    pub async fn load_source<R: BufRead>(
        &mut self,
        phase: Phase,
        source: &str,
        reader: R,
    ) -> Result<PhaseReport, PhaseFailure> {
        match phase {
            Phase::People => self.load_records::<R, Person>(phase, source, reader).await,
            Phase::Films => self.load_records::<R, Film>(phase, source, reader).await,
            Phase::Clients => self.load_records::<R, Client>(phase, source, reader).await,
        }
    }

    async fn load_records<R, T>(
        &mut self,
        phase: Phase,
        source: &str,
        reader: R,
    ) -> Result<PhaseReport, PhaseFailure>
    where
        R: BufRead,
        T: XmlRecord + ToRows,
    {
        let started = Instant::now();
        tracing::info!("Loading {} (<{}> records) from {}", phase, T::TAG, source);

        let checkpoint = self.registry.clone();
        let mut records = RecordReader::<R, T>::new(reader);
        let mut loaded = 0;
        let mut copies_drawn = BTreeMap::new();
        let mut loader = BatchLoader::new(self.options.batch_size).map_err(|error| PhaseFailure {
            phase,
            processed: 0,
            error,
        })?;

        if let Err(error) = self
            .stage_all(&mut records, &mut loader, &mut loaded, &mut copies_drawn)
            .await {
            self.rollback().await;
            self.registry = checkpoint;
            let failure = PhaseFailure {
                phase,
                processed: loaded,
                error,
            };
            tracing::error!("{}; phase rolled back", failure);
            return Err(failure);
        }

        let report = PhaseReport {
            phase,
            source: source.to_string(),
            loaded,
            skipped: records.skipped(),
            flush_sizes: loader.flush_sizes().to_vec(),
            rows_written: loader.rows_written().clone(),
            copies_per_film: copies_drawn,
            duration: started.elapsed(),
        };
        tracing::info!(
            "Committed {}: {} records loaded, {} skipped, {} rows in {} ({:.0} records/s)",
            phase,
            report.loaded,
            report.skipped,
            report.total_rows(),
            report.duration_string(),
            report.throughput()
        );
        tracing::debug!(
            "{} distinct writers registered so far",
            self.registry.writer_count()
        );
        Ok(report)
    }

    /// Stream, stage and commit every record of one phase
    async fn stage_all<R, T>(
        &mut self,
        records: &mut RecordReader<R, T>,
        loader: &mut BatchLoader,
        loaded: &mut usize,
        copies_drawn: &mut BTreeMap<i64, u32>,
    ) -> LoadResult<()>
    where
        R: BufRead,
        T: XmlRecord + ToRows,
    {
        self.begin().await?;

        for record in records.by_ref() {
            let record = record?;
            let rows = record.to_rows(&mut MappingContext {
                registry: &mut self.registry,
                rng: &mut self.rng,
                max_copies: self.options.max_copies,
                copies_drawn: &mut *copies_drawn,
            });
            loader.stage(&self.backend, rows).await?;
            *loaded += 1;
        }

        loader.finish(&self.backend).await?;
        self.commit().await
    }

    /// Run every phase of a plan
    ///
    /// Connectivity and reset failures end the run with an error. A failed
    /// phase is recorded in the summary; the run then stops or goes on per
    /// the failure policy.
    pub async fn run(&mut self, plan: &LoadPlan) -> LoadResult<LoadSummary> {
        self.check_connection().await?;

        let mut summary = LoadSummary::new(self.run_id, plan.reset());
        tracing::info!(
            "Starting load run {} on {} ({} phases, batch size {})",
            self.run_id,
            self.backend.backend_type(),
            plan.sources().len(),
            self.options.batch_size
        );
        tracing::info!(
            "Each phase commits on its own; a failed phase does not undo earlier ones"
        );

        if plan.reset() {
            self.reset_schema().await?;
        }

        for (phase, path) in plan.sources() {
            match self.load_phase(*phase, path).await {
                Ok(report) => summary.reports.push(report),
                Err(failure) => {
                    summary.failures.push(failure);
                    match self.options.on_phase_failure {
                        FailurePolicy::Abort => {
                            tracing::error!("Aborting run {} after failed {} phase", self.run_id, phase);
                            break;
                        }
                        FailurePolicy::Continue => {
                            tracing::warn!(
                                "Continuing after failed {} phase; destination is partially loaded",
                                phase
                            );
                        }
                    }
                }
            }
        }

        tracing::info!(
            "Run {} finished: {} records loaded, {} skipped, {} failed phases",
            self.run_id,
            summary.total_loaded(),
            summary.total_skipped(),
            summary.failures.len()
        );
        Ok(summary)
    }

    /// Roll back any open transaction and close the backend
    pub async fn shutdown(mut self) -> LoadResult<()> {
        if self.in_transaction {
            tracing::warn!("Rolling back transaction left open at shutdown");
            self.rollback().await;
        }
        self.backend.close().await?;
        tracing::debug!("Destination closed");
        Ok(())
    }

    /// Run a plan, then shut down whatever the outcome
    pub async fn run_and_shutdown(mut self, plan: &LoadPlan) -> LoadResult<LoadSummary> {
        let result = self.run(plan).await;
        let closed = self.shutdown().await;
        let summary = result?;
        closed?;
        Ok(summary)
    }
}
