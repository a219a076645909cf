//! Person model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A person who can direct films or act in them
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Person {
    /// Natural id from the source
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthplace: Option<String>,
    /// Photo URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biography: Option<String>,
}

impl Person {
    /// Create a person with only an id
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}
