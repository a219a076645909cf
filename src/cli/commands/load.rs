//! Load CLI commands
//!
//! One command per source kind plus `load`, which runs several phases in
//! dependency order in a single run.

use std::path::{Path, PathBuf};

use video_rental_loader::config::LoaderConfig;
use video_rental_loader::{
    DatabaseBackend, LoadOptions, LoadPlan, LoadSummary, Orchestrator, Phase,
};

use super::{BackendTask, with_backend};
use crate::error::CliError;

/// Full load arguments
#[derive(Debug, Clone, Default)]
pub struct LoadArgs {
    pub people: Option<PathBuf>,
    pub films: Option<PathBuf>,
    pub clients: Option<PathBuf>,
    /// Reset the schema before the first phase
    pub reset: bool,
}

impl LoadArgs {
    fn plan(&self) -> LoadPlan {
        let mut plan = LoadPlan::new().with_reset(self.reset);
        if let Some(path) = &self.people {
            plan = plan.people(path);
        }
        if let Some(path) = &self.films {
            plan = plan.films(path);
        }
        if let Some(path) = &self.clients {
            plan = plan.clients(path);
        }
        plan
    }
}

struct LoadTask {
    plan: LoadPlan,
    options: LoadOptions,
}

impl BackendTask for LoadTask {
    type Output = LoadSummary;

    async fn run<B: DatabaseBackend>(self, backend: B) -> Result<LoadSummary, CliError> {
        let orchestrator = Orchestrator::new(backend, self.options)?;
        Ok(orchestrator.run_and_shutdown(&self.plan).await?)
    }
}

fn check_source(path: &Path) -> Result<(), CliError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CliError::FileNotFound(path.to_path_buf()))
    }
}

fn print_summary(summary: &LoadSummary) {
    println!("Load run {}:", summary.run_id);
    if summary.reset {
        println!("  Schema:   reset");
    }
    for report in &summary.reports {
        println!(
            "  {:<8}  {} loaded, {} skipped, {} flushes, {} rows ({}, {:.0} records/s)",
            report.phase.to_string(),
            report.loaded,
            report.skipped,
            report.flush_sizes.len(),
            report.total_rows(),
            report.duration_string(),
            report.throughput()
        );
    }

    if !summary.failures.is_empty() {
        println!("\nFailed phases:");
        for failure in &summary.failures {
            println!("  - {}", failure);
        }
    }
}

fn run_plan(config: &LoaderConfig, plan: LoadPlan) -> Result<(), CliError> {
    for (_, path) in plan.sources() {
        check_source(path)?;
    }

    let phases = plan.sources().len();
    let summary = with_backend(
        config,
        LoadTask {
            plan,
            options: LoadOptions::from(&config.load),
        },
    )?;

    print_summary(&summary);
    if summary.is_success() {
        Ok(())
    } else {
        Err(CliError::PhasesFailed(summary.failures.len(), phases))
    }
}

/// Load a single source file as one phase
pub fn handle_phase(config: &LoaderConfig, phase: Phase, file: &Path) -> Result<(), CliError> {
    run_plan(config, LoadPlan::custom(vec![(phase, file.to_path_buf())]))
}

/// Load every given source in dependency order
pub fn handle_load(config: &LoaderConfig, args: &LoadArgs) -> Result<(), CliError> {
    let plan = args.plan();
    if plan.is_empty() && !plan.reset() {
        return Err(CliError::InvalidArgument(
            "Nothing to do: pass --people, --films, --clients or --reset".to_string(),
        ));
    }
    run_plan(config, plan)
}
