//! Catalog validation
//!
//! Checks that the table catalog can be created front to back and dropped
//! back to front: every foreign key names a known table and column, the
//! foreign-key graph has no cycle, and no table is declared before a
//! table it references.

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::NodeIndex;
use petgraph::{Directed, Graph};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::database::schema::TableDef;

/// Error during catalog validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum CatalogValidationError {
    #[error("Table \"{0}\" is declared twice")]
    DuplicateTable(String),

    #[error("Table \"{table}\" references unknown table \"{references}\"")]
    DanglingReference { table: String, references: String },

    #[error("Foreign key {foreign_key} on \"{table}\" names unknown column \"{column}\"")]
    UnknownColumn {
        table: String,
        foreign_key: String,
        column: String,
    },

    #[error("Foreign key cycle between {0:?}")]
    Cycle(Vec<String>),

    #[error("Table \"{table}\" is declared before \"{references}\", which it references")]
    OutOfOrder { table: String, references: String },
}

/// Catalog validator
#[derive(Default)]
pub struct CatalogValidator;

impl CatalogValidator {
    /// Create a new catalog validator
    pub fn new() -> Self {
        Self
    }

    /// Validate a catalog given in declared creation order
    ///
    /// # Returns
    ///
    /// A dependency-respecting creation order computed from the foreign-key
    /// graph. For a valid catalog the declared order is one such order.
    pub fn validate(&self, tables: &[TableDef]) -> Result<Vec<String>, CatalogValidationError> {
        let mut graph = Graph::<&str, &str, Directed>::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

        for table in tables {
            if nodes.contains_key(table.name) {
                return Err(CatalogValidationError::DuplicateTable(
                    table.name.to_string(),
                ));
            }
            nodes.insert(table.name, graph.add_node(table.name));
        }

        let by_name: HashMap<&str, &TableDef> = tables.iter().map(|t| (t.name, t)).collect();

        for table in tables {
            for fk in table.foreign_keys {
                let Some(parent) = by_name.get(fk.references) else {
                    return Err(CatalogValidationError::DanglingReference {
                        table: table.name.to_string(),
                        references: fk.references.to_string(),
                    });
                };

                let unknown_local = fk
                    .columns
                    .iter()
                    .find(|c| table.column_index(c).is_none());
                let unknown_remote = fk
                    .referenced_columns
                    .iter()
                    .find(|c| parent.column_index(c).is_none());
                if let Some(column) = unknown_local.or(unknown_remote) {
                    return Err(CatalogValidationError::UnknownColumn {
                        table: table.name.to_string(),
                        foreign_key: fk.name.to_string(),
                        column: column.to_string(),
                    });
                }

                if fk.references != table.name {
                    graph.add_edge(nodes[fk.references], nodes[table.name], fk.name);
                }
            }
        }

        let order = toposort(&graph, None).map_err(|_| {
            let cycle = tarjan_scc(&graph)
                .into_iter()
                .find(|component| component.len() > 1)
                .map(|component| {
                    component
                        .into_iter()
                        .map(|node| graph[node].to_string())
                        .collect()
                })
                .unwrap_or_default();
            CatalogValidationError::Cycle(cycle)
        })?;

        let position: HashMap<&str, usize> = tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name, i))
            .collect();
        for table in tables {
            for parent in table.dependencies() {
                if position[parent] > position[table.name] {
                    return Err(CatalogValidationError::OutOfOrder {
                        table: table.name.to_string(),
                        references: parent.to_string(),
                    });
                }
            }
        }

        Ok(order.into_iter().map(|node| graph[node].to_string()).collect())
    }
}

/// Validate the built-in catalog's declared order
pub fn validate_catalog(tables: &[TableDef]) -> Result<Vec<String>, CatalogValidationError> {
    CatalogValidator::new().validate(tables)
}
