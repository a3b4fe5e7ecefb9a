//! Reactive Collections
//!
//! This module implements observable collections and the filtered views
//! derived from them.
//!
//! # Concepts
//!
//! ## Subscriptions
//!
//! Every observable value hands out a [`Subscription`] when a listener is
//! attached. The listener stays attached exactly as long as the handle is
//! alive, so forgetting to detach is impossible to express: dropping the
//! handle is the detach.
//!
//! ## Collections
//!
//! A [`Collection`] is an ordered, identity de-duplicated set of entities.
//! It emits `Added`, `Removed`, `Changed` and `Reset`, and nothing else.
//!
//! ## Filtered views
//!
//! A [`FilteredCollection`] wraps a source collection and keeps a derived
//! collection equal to the members matching a [`Predicate`], patching it
//! incrementally as the source changes.
//!
//! # Implementation Notes
//!
//! Dispatch is synchronous: a mutation applies its state change, releases
//! its locks, and then runs every listener before returning. Nothing is
//! queued and nothing runs in the background.

mod collection;
mod filtered;
pub(crate) mod subscription;

pub use collection::{Collection, CollectionEvent, WeakCollection};
pub use filtered::{FilteredCollection, Predicate};
pub use subscription::{Subscription, SubscriptionId};
