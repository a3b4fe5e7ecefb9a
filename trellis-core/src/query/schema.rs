//! Search schema: which categories users can search by and how each one
//! maps onto entity fields.
//!
//! Schemas are plain configuration and can be loaded from JSON:
//!
//! ```json
//! { "facets": [
//!     { "name": "title",     "kind": "text",    "field": "title" },
//!     { "name": "assignees", "kind": "related", "relation": "assigned_users", "field": "email" },
//!     { "name": "completed", "kind": "boolean", "field": "complete" }
//! ] }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How a facet is matched against an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FacetKind {
    /// Substring match on a scalar field.
    Text { field: String },

    /// Exact `"true"` / `"false"` match on a boolean field.
    Boolean { field: String },

    /// Substring match on a sub-field of any entity in a nested collection.
    Related { relation: String, field: String },
}

/// A searchable category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    pub name: String,
    #[serde(flatten)]
    pub kind: FacetKind,
}

impl Facet {
    pub fn text(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FacetKind::Text {
                field: field.into(),
            },
        }
    }

    pub fn boolean(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FacetKind::Boolean {
                field: field.into(),
            },
        }
    }

    pub fn related(
        name: impl Into<String>,
        relation: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: FacetKind::Related {
                relation: relation.into(),
                field: field.into(),
            },
        }
    }
}

/// Ordered set of facets with unique names.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuerySchema {
    facets: Vec<Facet>,
}

impl QuerySchema {
    pub fn new(facets: Vec<Facet>) -> Result<Self, ConfigError> {
        for (index, facet) in facets.iter().enumerate() {
            if facets[..index].iter().any(|other| other.name == facet.name) {
                return Err(ConfigError::DuplicateFacet(facet.name.clone()));
            }
        }
        Ok(Self { facets })
    }

    /// Parse and validate a schema from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let schema: QuerySchema = serde_json::from_str(json)?;
        Self::new(schema.facets)
    }

    pub fn facet(&self, name: &str) -> Option<&Facet> {
        self.facets.iter().find(|facet| facet.name == name)
    }

    pub fn facets(&self) -> &[Facet] {
        &self.facets
    }

    /// Facet names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.facets.iter().map(|facet| facet.name.as_str()).collect()
    }
}
