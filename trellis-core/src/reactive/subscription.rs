//! Listener registries and subscription handles.
//!
//! Every observable value (entity, collection) owns a [`Listeners`] list.
//! Subscribing returns a [`Subscription`] handle; the listener stays attached
//! until the handle is closed or dropped, whichever comes first.
//!
//! # Dispatch
//!
//! [`Listeners::emit`] snapshots the listener list, releases the lock and
//! only then calls each listener in subscription order. Listeners may
//! therefore subscribe, unsubscribe or mutate the emitter re-entrantly.
//! A listener detached while an emission is in flight may still receive that
//! one event; it never receives later ones.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Unique identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Generate a new unique subscription ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Something a subscription can be detached from.
///
/// Type-erases the event type so a [`Subscription`] does not carry it.
trait Detach: Send + Sync {
    fn detach(&self, id: SubscriptionId) -> bool;
}

/// An ordered list of listeners for events of type `E`.
pub(crate) struct Listeners<E> {
    entries: Mutex<Vec<(SubscriptionId, Listener<E>)>>,
}

impl<E: 'static> Listeners<E> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(Vec::new()),
        })
    }

    /// Attach a listener. It is called for every event emitted after this
    /// returns, until the handle is closed or dropped.
    pub(crate) fn subscribe<F>(self: &Arc<Self>, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.entries.lock().push((id, Arc::new(listener)));

        let source: Arc<dyn Detach> = self.clone();
        Subscription {
            id,
            source: Some(Arc::downgrade(&source)),
        }
    }

    /// Deliver an event to every listener attached at the time of the call.
    pub(crate) fn emit(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = self
            .entries
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener(event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

impl<E: 'static> Detach for Listeners<E> {
    fn detach(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }
}

/// Handle to an attached listener.
///
/// Dropping the handle detaches the listener. The handle only holds a weak
/// reference to the emitter, so it never keeps the emitter alive.
#[must_use = "dropping a Subscription detaches its listener immediately"]
pub struct Subscription {
    id: SubscriptionId,
    source: Option<Weak<dyn Detach>>,
}

impl Subscription {
    /// Get the subscription's unique ID.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Check whether the listener is still attached to a live emitter.
    pub fn is_active(&self) -> bool {
        self.source
            .as_ref()
            .map_or(false, |source| source.strong_count() > 0)
    }

    /// Detach the listener now.
    ///
    /// Returns false if the emitter was already gone.
    pub fn close(mut self) -> bool {
        self.detach()
    }

    fn detach(&mut self) -> bool {
        match self.source.take().and_then(|source| source.upgrade()) {
            Some(source) => source.detach(self.id),
            None => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn subscription_ids_are_unique() {
        let id1 = SubscriptionId::new();
        let id2 = SubscriptionId::new();
        let id3 = SubscriptionId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn emit_calls_listeners_in_subscription_order() {
        let listeners = Listeners::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let seen = seen.clone();
            listeners.subscribe(move |event: &u32| seen.lock().push(("first", *event)))
        };
        let second = {
            let seen = seen.clone();
            listeners.subscribe(move |event: &u32| seen.lock().push(("second", *event)))
        };

        listeners.emit(&7);
        assert_eq!(*seen.lock(), vec![("first", 7), ("second", 7)]);

        drop(first);
        drop(second);
    }

    #[test]
    fn close_detaches_listener() {
        let listeners = Listeners::<()>::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        let subscription = listeners.subscribe(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        listeners.emit(&());
        assert_eq!(listeners.len(), 1);

        assert!(subscription.close());
        listeners.emit(&());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(listeners.len(), 0);
    }

    #[test]
    fn drop_detaches_listener() {
        let listeners = Listeners::<()>::new();
        let subscription = listeners.subscribe(|_| {});
        assert_eq!(listeners.len(), 1);

        drop(subscription);
        assert_eq!(listeners.len(), 0);
    }

    #[test]
    fn subscription_does_not_keep_emitter_alive() {
        let listeners = Listeners::<()>::new();
        let subscription = listeners.subscribe(|_| {});
        assert!(subscription.is_active());

        drop(listeners);
        assert!(!subscription.is_active());
        assert!(!subscription.close());
    }

    #[test]
    fn listener_may_subscribe_during_emit() {
        let listeners = Listeners::<()>::new();
        let late = Arc::new(Mutex::new(Vec::new()));

        let keep = {
            let listeners_weak = Arc::downgrade(&listeners);
            let late = late.clone();
            listeners.subscribe(move |_| {
                if let Some(listeners) = listeners_weak.upgrade() {
                    late.lock().push(listeners.subscribe(|_| {}));
                }
            })
        };

        listeners.emit(&());
        assert_eq!(listeners.len(), 2);

        drop(keep);
        late.lock().clear();
        assert_eq!(listeners.len(), 0);
    }
}
