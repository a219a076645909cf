//! Bulk loading
//!
//! A load run is a sequence of phases, one per source file. Within a phase
//! each completed record is mapped to dependency-ordered rows
//! ([`rows`]), reference data is deduplicated across the whole run
//! ([`registry`]), rows are buffered and flushed in batches ([`batch`]),
//! and the phase is committed as one transaction ([`orchestrator`]).

pub mod batch;
pub mod orchestrator;
pub mod registry;
pub mod rows;

pub use batch::BatchLoader;
pub use orchestrator::{LoadOptions, LoadPlan, LoadSummary, Orchestrator, PhaseReport};
pub use registry::{ReferenceKind, ReferenceRegistry};
pub use rows::{MappingContext, StagedRow, ToRows};

use serde::{Deserialize, Serialize};

/// One source kind, loaded as a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    People,
    Films,
    Clients,
}

impl Phase {
    /// All phases in dependency order
    pub const ALL: [Phase; 3] = [Phase::People, Phase::Films, Phase::Clients];
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::People => write!(f, "people"),
            Phase::Films => write!(f, "films"),
            Phase::Clients => write!(f, "clients"),
        }
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "people" | "persons" | "personnes" => Ok(Phase::People),
            "films" => Ok(Phase::Films),
            "clients" => Ok(Phase::Clients),
            _ => Err(format!("Unknown phase: {}", s)),
        }
    }
}
