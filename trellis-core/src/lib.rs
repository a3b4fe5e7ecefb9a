//! Trellis Core
//!
//! This crate provides the client-side data layer for the Trellis task
//! tracker. It implements:
//!
//! - Observable entities with per-field change notification
//! - Observable, identity de-duplicated collections
//! - Live filtered views that track a predicate incrementally
//! - A query compiler turning search terms into filter predicates
//! - A persistence seam with save/destroy completion callbacks
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `model`: entities and field values
//! - `reactive`: subscriptions, collections and filtered views
//! - `query`: search schema, term compiler and the search box
//! - `sync`: the `Store` trait and an in-memory store
//! - `tasks`: task-specific schema and helpers
//!
//! # Example
//!
//! ```rust
//! use trellis_core::model::Entity;
//! use trellis_core::reactive::{Collection, Predicate};
//!
//! let tasks = Collection::with_entities([
//!     Entity::with_fields([("title", "Anchors away"), ("state", "open")]),
//!     Entity::with_fields([("title", "Batten down"), ("state", "done")]),
//! ]);
//!
//! let open = tasks.filtered(Predicate::new(|task| {
//!     task.get_str("state").as_deref() == Some("open")
//! }));
//! assert_eq!(open.len(), 1);
//!
//! // Editing a task moves it in or out of the view.
//! tasks.at(1).unwrap().set([("state", "open")]);
//! assert_eq!(open.len(), 2);
//! ```

pub mod error;
pub mod model;
pub mod query;
pub mod reactive;
pub mod sync;
pub mod tasks;

pub use error::{ConfigError, ModelError, PersistError};
pub use model::{Entity, EntityEvent, EntityId, Value};
pub use query::{QuerySchema, Search, SearchTerm};
pub use reactive::{Collection, CollectionEvent, FilteredCollection, Predicate, Subscription};
pub use sync::{MemoryStore, Store};
