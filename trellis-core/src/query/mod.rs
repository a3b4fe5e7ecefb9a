//! Query Compiler
//!
//! Turns structured search terms into a [`Predicate`](crate::reactive::Predicate)
//! for a filtered view, and answers the autocomplete questions a search box
//! asks: which categories exist, and which values each category currently
//! takes.

mod compiler;
mod schema;
mod search;

pub use compiler::{compile, value_matches, SearchTerm};
pub use schema::{Facet, FacetKind, QuerySchema};
pub use search::Search;
