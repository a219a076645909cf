//! CLI command implementations

pub mod config;
pub mod db;
pub mod load;

use video_rental_loader::config::{BackendType, LoaderConfig};
use video_rental_loader::{DatabaseBackend, LoadError, MemoryBackend};

use crate::error::CliError;

/// Work that runs against whichever backend the configuration selects
pub trait BackendTask {
    type Output;

    async fn run<B: DatabaseBackend>(self, backend: B) -> Result<Self::Output, CliError>;
}

/// Open the configured backend on a fresh runtime and run `task` on it
pub fn with_backend<T: BackendTask>(config: &LoaderConfig, task: T) -> Result<T::Output, CliError> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))?;

    rt.block_on(async {
        match config.database.backend {
            BackendType::Memory => {
                tracing::warn!("Using the memory backend; nothing will be persisted");
                task.run(MemoryBackend::new()).await
            }
            BackendType::DuckDB => {
                #[cfg(feature = "duckdb-backend")]
                {
                    use video_rental_loader::DuckDBBackend;

                    let backend = DuckDBBackend::open(config.duckdb_path()).map_err(LoadError::from)?;
                    tracing::info!("Opened DuckDB database at {}", config.duckdb_path());
                    if backend.is_in_memory() {
                        tracing::warn!("DuckDB is running in memory; nothing will be persisted");
                    }
                    task.run(backend).await
                }
                #[cfg(not(feature = "duckdb-backend"))]
                {
                    Err(CliError::InvalidArgument(
                        "DuckDB backend not enabled. Build with --features duckdb-backend"
                            .to_string(),
                    ))
                }
            }
            BackendType::Postgres => {
                #[cfg(feature = "postgres-backend")]
                {
                    use video_rental_loader::PostgresBackend;

                    let conn_str = config.postgres_connection_string().ok_or_else(|| {
                        CliError::InvalidArgument(
                            "PostgreSQL connection string not configured".to_string(),
                        )
                    })?;
                    let backend = PostgresBackend::new(conn_str)
                        .await
                        .map_err(LoadError::from)?;
                    tracing::info!(
                        "Connected to PostgreSQL at {}",
                        backend.connection_string_masked()
                    );
                    task.run(backend).await
                }
                #[cfg(not(feature = "postgres-backend"))]
                {
                    Err(CliError::InvalidArgument(
                        "PostgreSQL backend not enabled. Build with --features postgres-backend"
                            .to_string(),
                    ))
                }
            }
        }
    })
}
