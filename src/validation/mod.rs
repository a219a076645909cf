//! Validation functionality
//!
//! Provides validation logic for:
//! - Catalog validation (dangling references, foreign-key cycles, declaration order)

pub mod catalog;

pub use catalog::{CatalogValidationError, CatalogValidator, validate_catalog};
