//! Search terms to predicates.
//!
//! A search is a list of `category: value` terms, combined with AND. Each
//! term is matched according to the kind of its facet in the schema.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::schema::{FacetKind, QuerySchema};
use crate::model::Entity;
use crate::reactive::{Collection, Predicate};

/// Values offered for boolean facets.
const BOOLEAN_VALUES: [&str; 2] = ["true", "false"];

/// One `category: value` pair entered by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTerm {
    pub category: String,
    pub value: String,
}

impl SearchTerm {
    pub fn new(category: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            value: value.into(),
        }
    }
}

/// A term bound to the facet kind it is matched with.
#[derive(Debug, Clone)]
struct Matcher {
    kind: FacetKind,
    value: String,
}

impl Matcher {
    fn matches(&self, entity: &Entity) -> bool {
        match &self.kind {
            FacetKind::Text { field } => entity
                .get(field)
                .and_then(|value| value.to_text())
                .map_or(false, |text| text.contains(&self.value)),
            FacetKind::Boolean { field } => {
                let flag = entity.get_bool(field).unwrap_or(false);
                self.value == flag.to_string()
            }
            FacetKind::Related { relation, field } => {
                entity.relation(relation).map_or(false, |related| {
                    related.to_vec().iter().any(|member| {
                        member
                            .get(field)
                            .and_then(|value| value.to_text())
                            .map_or(false, |text| text.contains(&self.value))
                    })
                })
            }
        }
    }
}

/// Compile search terms into a single predicate.
///
/// Terms naming a category the schema does not know are ignored. With no
/// usable terms the predicate accepts every entity.
pub fn compile(schema: &QuerySchema, terms: &[SearchTerm]) -> Predicate {
    let matchers: Vec<Matcher> = terms
        .iter()
        .filter_map(|term| match schema.facet(&term.category) {
            Some(facet) => Some(Matcher {
                kind: facet.kind.clone(),
                value: term.value.clone(),
            }),
            None => {
                tracing::warn!(category = %term.category, "ignoring search term for unknown facet");
                None
            }
        })
        .collect();

    if matchers.is_empty() {
        return Predicate::accept_all();
    }

    tracing::debug!(terms = matchers.len(), "compiled search");
    Predicate::new(move |entity| matchers.iter().all(|matcher| matcher.matches(entity)))
}

/// Distinct values of a facet across `source`, in first-seen order.
///
/// Computed fresh on every call. Boolean facets always offer both values;
/// unknown facets offer nothing.
pub fn value_matches(schema: &QuerySchema, facet: &str, source: &Collection) -> Vec<String> {
    let Some(facet) = schema.facet(facet) else {
        return Vec::new();
    };

    let mut values = IndexSet::new();
    match &facet.kind {
        FacetKind::Text { field } => {
            for entity in source.to_vec() {
                if let Some(text) = entity.get(field).and_then(|value| value.to_text()) {
                    values.insert(text);
                }
            }
        }
        FacetKind::Boolean { .. } => {
            values.extend(BOOLEAN_VALUES.iter().map(|value| value.to_string()));
        }
        FacetKind::Related { relation, field } => {
            for entity in source.to_vec() {
                let Some(related) = entity.relation(relation) else {
                    continue;
                };
                for member in related.to_vec() {
                    if let Some(text) = member.get(field).and_then(|value| value.to_text()) {
                        values.insert(text);
                    }
                }
            }
        }
    }
    values.into_iter().collect()
}
