//! CLI-specific error types

use std::path::PathBuf;
use thiserror::Error;
use video_rental_loader::{DatabaseError, LoadError};

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to write file {0}: {1}")]
    FileWriteError(PathBuf, String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Load(#[from] LoadError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("{0} of {1} phases failed")]
    PhasesFailed(usize, usize),
}
