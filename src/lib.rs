//! Video Rental Loader - schema provisioning and streaming XML bulk loading
//!
//! Provides:
//! - A fixed, dependency-ordered catalog of video-rental relations
//! - Streaming extraction of people, films and clients from XML sources
//! - Run-wide deduplication of reference data (countries, genres, writers,
//!   card types, plan codes)
//! - Batched, foreign-key ordered writes to DuckDB, PostgreSQL or memory
//! - Per-phase transactional orchestration with a configurable failure policy

pub mod config;
pub mod database;
pub mod error;
pub mod import;
pub mod load;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use config::{BackendType, FailurePolicy, LoaderConfig};
#[cfg(feature = "duckdb-backend")]
pub use database::DuckDBBackend;
#[cfg(feature = "postgres-backend")]
pub use database::PostgresBackend;
pub use database::{DatabaseBackend, DatabaseError, DatabaseSchema, MemoryBackend, TableDef};
pub use error::{LoadError, LoadResult, PhaseFailure};
pub use import::{RecordReader, XmlRecord};
pub use load::{LoadOptions, LoadPlan, LoadSummary, Orchestrator, Phase, PhaseReport};
pub use models::{Client, Film, Person};
pub use validation::{CatalogValidationError, validate_catalog};
