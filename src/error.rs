//! Load error taxonomy
//!
//! Destination errors are reclassified on the way up: connection failures
//! become [`LoadError::Connectivity`] and constraint violations become
//! [`LoadError::Constraint`], so callers can match on what went wrong
//! without knowing which backend raised it.

use crate::database::DatabaseError;
use crate::load::Phase;
use crate::validation::CatalogValidationError;

/// Error raised while resetting the schema or loading a source
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The destination cannot be reached or authenticated against
    #[error("Cannot reach destination: {0}")]
    Connectivity(String),

    /// Creating or dropping a relation failed
    #[error("Schema error on \"{table}\": {source}")]
    Schema {
        table: String,
        #[source]
        source: DatabaseError,
    },

    /// A numeric or date field holds text that cannot be parsed
    #[error("Invalid {field} \"{value}\" in <{record}> {id}")]
    Parse {
        record: &'static str,
        id: String,
        field: &'static str,
        value: String,
    },

    /// A flush violated a key, uniqueness or foreign key constraint
    #[error("Constraint violation on \"{table}\": {message}")]
    Constraint { table: String, message: String },

    /// The source is not well-formed XML
    #[error("XML error: {0}")]
    Xml(String),

    /// Reading the source failed
    #[error("IO error: {0}")]
    Io(String),

    /// Any other destination failure
    #[error("Database error: {0}")]
    Database(DatabaseError),

    /// Invalid load settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// The table catalog cannot be created in declared order
    #[error("Invalid catalog: {0}")]
    Catalog(#[from] CatalogValidationError),
}

impl From<DatabaseError> for LoadError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::ConnectionFailed(message) => LoadError::Connectivity(message),
            DatabaseError::ConstraintViolation { table, message } => {
                LoadError::Constraint { table, message }
            }
            DatabaseError::ConfigError(message) => LoadError::Config(message),
            other => LoadError::Database(other),
        }
    }
}

impl From<quick_xml::Error> for LoadError {
    fn from(error: quick_xml::Error) -> Self {
        LoadError::Xml(error.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for LoadError {
    fn from(error: quick_xml::events::attributes::AttrError) -> Self {
        LoadError::Xml(error.to_string())
    }
}

impl From<std::io::Error> for LoadError {
    fn from(error: std::io::Error) -> Self {
        LoadError::Io(error.to_string())
    }
}

/// Result type for load operations
pub type LoadResult<T> = Result<T, LoadError>;

/// A phase that was abandoned, with the records it got through first
#[derive(Debug, thiserror::Error)]
#[error("{phase} phase failed after {processed} records: {error}")]
pub struct PhaseFailure {
    pub phase: Phase,
    /// Top-level records fully processed before the failure
    pub processed: usize,
    #[source]
    pub error: LoadError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_errors_are_reclassified() {
        let err: LoadError = DatabaseError::ConnectionFailed("refused".to_string()).into();
        assert!(matches!(err, LoadError::Connectivity(_)));

        let err: LoadError = DatabaseError::ConstraintViolation {
            table: "Film".to_string(),
            message: "duplicate key".to_string(),
        }
        .into();
        assert!(matches!(err, LoadError::Constraint { ref table, .. } if table == "Film"));

        let err: LoadError = DatabaseError::QueryFailed("syntax".to_string()).into();
        assert!(matches!(err, LoadError::Database(_)));
    }

    #[test]
    fn test_parse_error_message() {
        let err = LoadError::Parse {
            record: "film",
            id: "12".to_string(),
            field: "annee",
            value: "mil neuf cent".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid annee \"mil neuf cent\" in <film> 12");
    }

    #[test]
    fn test_phase_failure_message() {
        let failure = PhaseFailure {
            phase: Phase::Films,
            processed: 40,
            error: LoadError::Io("broken pipe".to_string()),
        };
        assert_eq!(
            failure.to_string(),
            "films phase failed after 40 records: IO error: broken pipe"
        );
    }
}
