//! Configuration CLI command

use std::path::PathBuf;

use video_rental_loader::config::sample_config;

use crate::error::CliError;

/// Init-config arguments
#[derive(Debug, Clone)]
pub struct InitConfigArgs {
    /// Where to write the sample configuration
    pub path: PathBuf,
    /// Overwrite an existing file
    pub force: bool,
}

/// Write a commented sample configuration file
pub fn handle_init_config(args: &InitConfigArgs) -> Result<(), CliError> {
    if args.path.exists() && !args.force {
        return Err(CliError::InvalidArgument(format!(
            "{} already exists. Use --force to overwrite.",
            args.path.display()
        )));
    }

    std::fs::write(&args.path, sample_config())
        .map_err(|e| CliError::FileWriteError(args.path.clone(), e.to_string()))?;

    println!("Created {}", args.path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use video_rental_loader::LoaderConfig;

    #[test]
    fn test_init_config_writes_parseable_sample() {
        let dir = tempdir().unwrap();
        let args = InitConfigArgs {
            path: dir.path().join("rental-loader.toml"),
            force: false,
        };

        handle_init_config(&args).unwrap();
        let content = std::fs::read_to_string(&args.path).unwrap();
        assert!(LoaderConfig::parse(&content).is_ok());

        let err = handle_init_config(&args).unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument(_)));

        let forced = InitConfigArgs {
            force: true,
            ..args
        };
        assert!(handle_init_config(&forced).is_ok());
    }
}
