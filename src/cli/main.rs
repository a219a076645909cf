//! CLI binary entry point for rental-loader

mod commands;
mod error;

use clap::{Parser, Subcommand};
use commands::config::{InitConfigArgs, handle_init_config};
use commands::db::{StatusArgs, handle_reset, handle_status};
use commands::load::{LoadArgs, handle_load, handle_phase};
use error::CliError;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use video_rental_loader::Phase;
use video_rental_loader::config::{CONFIG_FILENAME, LoaderConfig};

#[derive(Parser)]
#[command(name = "rental-loader")]
#[command(about = "Provision the video-rental schema and bulk-load it from XML")]
#[command(version)]
struct Cli {
    /// Configuration file (default: rental-loader.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop and recreate every table
    Reset,
    /// Load people from a <personne> file
    People {
        /// XML source file
        file: PathBuf,
    },
    /// Load films from a <film> file
    Films {
        /// XML source file
        file: PathBuf,
    },
    /// Load clients from a <client> file
    Clients {
        /// XML source file
        file: PathBuf,
    },
    /// Load several sources in one run (people, then films, then clients)
    Load {
        /// People XML file
        #[arg(long)]
        people: Option<PathBuf>,
        /// Films XML file
        #[arg(long)]
        films: Option<PathBuf>,
        /// Clients XML file
        #[arg(long)]
        clients: Option<PathBuf>,
        /// Reset the schema before loading
        #[arg(long)]
        reset: bool,
    },
    /// Show the row count of every table
    Status {
        /// Output format (table, json, csv)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
    /// Write a sample configuration file
    InitConfig {
        /// Output path
        #[arg(default_value = CONFIG_FILENAME)]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<LoaderConfig, CliError> {
    Ok(LoaderConfig::load(path.map(PathBuf::as_path))?)
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::InitConfig { path, force } => handle_init_config(&InitConfigArgs { path, force }),
        Commands::Reset => handle_reset(&load_config(cli.config.as_ref())?),
        Commands::People { file } => {
            handle_phase(&load_config(cli.config.as_ref())?, Phase::People, &file)
        }
        Commands::Films { file } => {
            handle_phase(&load_config(cli.config.as_ref())?, Phase::Films, &file)
        }
        Commands::Clients { file } => {
            handle_phase(&load_config(cli.config.as_ref())?, Phase::Clients, &file)
        }
        Commands::Load {
            people,
            films,
            clients,
            reset,
        } => {
            let args = LoadArgs {
                people,
                films,
                clients,
                reset,
            };
            handle_load(&load_config(cli.config.as_ref())?, &args)
        }
        Commands::Status { format } => {
            handle_status(&load_config(cli.config.as_ref())?, &StatusArgs { format })
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
