//! A search box over a collection: owns a filtered view, refilters it from
//! search terms and answers autocomplete questions.

use super::compiler::{compile, value_matches, SearchTerm};
use super::schema::QuerySchema;
use crate::reactive::{Collection, FilteredCollection, Predicate};

pub struct Search {
    schema: QuerySchema,
    filtered: FilteredCollection,
}

impl Search {
    /// Start with every member of `collection` visible.
    pub fn new(collection: Collection, schema: QuerySchema) -> Self {
        Self {
            schema,
            filtered: FilteredCollection::new(collection, Predicate::accept_all()),
        }
    }

    /// Show only the members matching all `terms`.
    pub fn search(&self, terms: &[SearchTerm]) {
        self.filtered.refilter(compile(&self.schema, terms));
    }

    /// Show every member again.
    pub fn clear(&self) {
        self.filtered.refilter(Predicate::accept_all());
    }

    /// Searchable categories, in schema order.
    pub fn facet_matches(&self) -> Vec<&str> {
        self.schema.names()
    }

    /// Known values for a category, for autocomplete.
    pub fn value_matches(&self, facet: &str) -> Vec<String> {
        value_matches(&self.schema, facet, self.filtered.source())
    }

    /// The full collection being searched.
    pub fn collection(&self) -> &Collection {
        self.filtered.source()
    }

    /// The members matching the current search.
    pub fn filtered(&self) -> &Collection {
        self.filtered.collection()
    }

    pub fn schema(&self) -> &QuerySchema {
        &self.schema
    }

    /// Stop following the searched collection; returns the last results.
    pub fn teardown(self) -> Collection {
        self.filtered.teardown()
    }
}

impl std::fmt::Debug for Search {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Search")
            .field("facets", &self.schema.names())
            .field("filtered", &self.filtered)
            .finish()
    }
}
