//! Film model

use serde::{Deserialize, Serialize};

/// Reference to the person who directed a film
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Director {
    /// Person id
    pub id: i64,
    /// Name as written in the film record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A cast role: an actor playing a character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Person id of the actor
    pub actor_id: i64,
    /// Actor name as written in the film record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
}

/// A film with its nested associations
///
/// Collections keep source order. Duplicate country, genre or writer names
/// are kept here and collapsed when rows are produced.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Film {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i64>,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Running time in minutes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub director: Option<Director>,
    /// Writer names
    #[serde(default)]
    pub writers: Vec<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Poster URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    /// Trailer URLs
    #[serde(default)]
    pub trailers: Vec<String>,
}

impl Film {
    /// Create a film with only an id
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}
