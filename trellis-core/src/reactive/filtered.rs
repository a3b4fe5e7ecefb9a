//! Derived Filtered View
//!
//! A [`FilteredCollection`] keeps a second collection equal to the members
//! of a source collection that satisfy a predicate:
//!
//! ```text
//! view.members == { e ∈ source.members | predicate(e) }
//! ```
//!
//! # How It Works
//!
//! 1. On construction the view subscribes to the source and initialises its
//!    membership with a full `reset(source.select(predicate))`.
//!
//! 2. Afterwards it patches membership incrementally from source events:
//!    - `Added(e)`: add `e` if it matches
//!    - `Removed(e)`: remove `e` (no-op if it was never a member)
//!    - `Changed(e)`: a matching member re-emits `Changed`, a newly matching
//!      entity is added (emitting `Added` only), a non-matching one is
//!      removed
//!    - `Reset`: recompute from scratch
//!
//! 3. [`FilteredCollection::refilter`] swaps the predicate and recomputes with
//!    a single `Reset`, no incremental diff.
//!
//! # Lifetime
//!
//! The source keeps the view's handler alive for as long as the
//! subscription exists. [`FilteredCollection::teardown`] closes it and hands
//! back the view, now inert but still readable. Dropping a
//! `FilteredCollection` closes the subscription as well.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::RwLock;

use super::collection::{Collection, CollectionEvent, WeakCollection};
use super::subscription::Subscription;
use crate::model::Entity;

/// A filter criterion: a pure function from entity to bool.
///
/// Predicates must not panic; a panic propagates to whoever triggered the
/// mutation being filtered.
#[derive(Clone)]
pub struct Predicate(Arc<dyn Fn(&Entity) -> bool + Send + Sync>);

impl Predicate {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Entity) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    /// The identity filter.
    pub fn accept_all() -> Self {
        Self::new(|_| true)
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        (self.0)(entity)
    }
}

impl Default for Predicate {
    fn default() -> Self {
        Self::accept_all()
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

/// A live view over the members of a source collection that match a
/// predicate.
pub struct FilteredCollection {
    source: Collection,
    view: Collection,
    predicate: Arc<RwLock<Predicate>>,
    subscription: Subscription,
}

impl FilteredCollection {
    /// Create a view of `source` filtered by `predicate`.
    pub fn new(source: Collection, predicate: Predicate) -> Self {
        let view = Collection::view();
        let predicate = Arc::new(RwLock::new(predicate));

        let subscription = {
            let view = view.clone();
            let live = Arc::clone(&predicate);
            let weak_source = source.downgrade();
            source.subscribe(move |event| {
                // Clone out of the lock so the predicate may itself read or
                // refilter without deadlocking.
                let predicate = live.read().clone();
                on_source_event(&view, &weak_source, &predicate, event);
            })
        };

        let initial = source.select(|entity| predicate.read().matches(entity));
        view.reset(initial);

        tracing::debug!(
            source_len = source.len(),
            view_len = view.len(),
            "filtered view created"
        );

        Self {
            source,
            view,
            predicate,
            subscription,
        }
    }

    /// The derived collection. Subscribe to it to follow membership changes.
    pub fn collection(&self) -> &Collection {
        &self.view
    }

    /// The collection this view is derived from.
    pub fn source(&self) -> &Collection {
        &self.source
    }

    /// Replace the predicate and recompute membership from scratch.
    ///
    /// Emits exactly one `Reset` on the view.
    pub fn refilter(&self, predicate: Predicate) {
        *self.predicate.write() = predicate.clone();
        let members = self.source.select(|entity| predicate.matches(entity));

        tracing::debug!(view_len = members.len(), "filtered view refiltered");
        self.view.reset(members);
    }

    /// Stop following the source and return the view, which keeps its
    /// current members but receives no further updates.
    pub fn teardown(self) -> Collection {
        let Self {
            view, subscription, ..
        } = self;
        subscription.close();

        tracing::debug!(view_len = view.len(), "filtered view torn down");
        view
    }

    /// Check whether the view still follows its source.
    pub fn is_active(&self) -> bool {
        self.subscription.is_active()
    }
}

impl Deref for FilteredCollection {
    type Target = Collection;

    fn deref(&self) -> &Collection {
        &self.view
    }
}

impl fmt::Debug for FilteredCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilteredCollection")
            .field("source_len", &self.source.len())
            .field("view_len", &self.view.len())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Patch the view after a source notification.
///
/// A listener that ran earlier in the same dispatch may already have
/// mutated the source, so membership is checked against the source as it
/// is now rather than trusted from the event.
fn on_source_event(
    view: &Collection,
    source: &WeakCollection,
    predicate: &Predicate,
    event: &CollectionEvent,
) {
    let Some(source) = source.upgrade() else {
        return;
    };

    match event {
        CollectionEvent::Added(entity) => {
            if source.contains(entity) && predicate.matches(entity) {
                view.add(entity.clone());
            }
        }
        CollectionEvent::Removed(entity) => {
            if !source.contains(entity) {
                view.remove(entity);
            }
        }
        CollectionEvent::Changed(entity) => {
            if !source.contains(entity) || !predicate.matches(entity) {
                view.remove(entity);
            } else if view.contains(entity) {
                view.notify_changed(entity);
            } else {
                view.add(entity.clone());
            }
        }
        CollectionEvent::Reset => {
            view.reset(source.select(|entity| predicate.matches(entity)));
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
