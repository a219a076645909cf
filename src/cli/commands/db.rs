//! Schema management CLI commands
//!
//! Provides commands for resetting the schema and showing table row counts.

use video_rental_loader::config::LoaderConfig;
use video_rental_loader::database::{OutputFormat, format_query_result, table_counts};
use video_rental_loader::{DatabaseBackend, DatabaseSchema, LoadOptions, Orchestrator};

use super::{BackendTask, with_backend};
use crate::error::CliError;

/// Status command arguments
#[derive(Debug, Clone)]
pub struct StatusArgs {
    /// Output format (table, json, csv)
    pub format: String,
}

struct ResetTask {
    options: LoadOptions,
}

impl BackendTask for ResetTask {
    type Output = ();

    async fn run<B: DatabaseBackend>(self, backend: B) -> Result<(), CliError> {
        let mut orchestrator = Orchestrator::new(backend, self.options)?;
        let outcome = async {
            orchestrator.check_connection().await?;
            orchestrator.reset_schema().await
        }
        .await;
        let closed = orchestrator.shutdown().await;
        outcome?;
        closed?;
        Ok(())
    }
}

/// Drop and recreate every catalog table
pub fn handle_reset(config: &LoaderConfig) -> Result<(), CliError> {
    with_backend(
        config,
        ResetTask {
            options: LoadOptions::from(&config.load),
        },
    )?;
    println!(
        "Schema reset: {} tables created",
        DatabaseSchema::tables().len()
    );
    Ok(())
}

struct StatusTask {
    format: OutputFormat,
}

impl BackendTask for StatusTask {
    type Output = ();

    async fn run<B: DatabaseBackend>(self, backend: B) -> Result<(), CliError> {
        let healthy = backend.health_check().await.unwrap_or(false);
        let counts = table_counts(&backend).await;
        backend.close().await?;

        let counts = counts?;
        println!("{}", format_query_result(&counts, self.format));

        if self.format != OutputFormat::Json {
            eprintln!("\nBackend: {}", backend.backend_type());
            eprintln!("Healthy: {}", if healthy { "yes" } else { "no" });
        }
        Ok(())
    }
}

/// Print the row count of every catalog table
pub fn handle_status(config: &LoaderConfig, args: &StatusArgs) -> Result<(), CliError> {
    let format: OutputFormat = args
        .format
        .parse()
        .map_err(|e: String| CliError::InvalidArgument(e))?;

    with_backend(config, StatusTask { format })
}
