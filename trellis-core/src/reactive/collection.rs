//! Observable Collection
//!
//! A [`Collection`] is an ordered set of entities, de-duplicated by
//! identity. Insertion order is iteration order.
//!
//! # Notifications
//!
//! A collection only ever emits the four [`CollectionEvent`] kinds:
//!
//! - `Added` after a successful `add`
//! - `Removed` after a successful `remove`, or when a member is destroyed
//! - `Changed` when a member emits [`EntityEvent::Changed`]
//! - `Reset` once per `reset`, with no per-item events
//!
//! # Member tracking
//!
//! The collection watches each member so it can relay its changes and keep
//! the server-id index current when a member is saved for the first time.
//! The watch holds only a weak reference back to the collection.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value as JsonValue;

use super::filtered::{FilteredCollection, Predicate};
use super::subscription::{Listeners, Subscription};
use crate::model::{ClientId, Entity, EntityEvent, EntityId, Value, ID_FIELD};

/// Notification emitted by a collection.
#[derive(Debug, Clone)]
pub enum CollectionEvent {
    Added(Entity),
    Removed(Entity),
    Changed(Entity),
    Reset,
}

impl CollectionEvent {
    /// The entity the event is about. `Reset` concerns every member.
    pub fn entity(&self) -> Option<&Entity> {
        match self {
            CollectionEvent::Added(entity)
            | CollectionEvent::Removed(entity)
            | CollectionEvent::Changed(entity) => Some(entity),
            CollectionEvent::Reset => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CollectionEvent::Added(_) => "added",
            CollectionEvent::Removed(_) => "removed",
            CollectionEvent::Changed(_) => "changed",
            CollectionEvent::Reset => "reset",
        }
    }
}

struct Member {
    entity: Entity,
    _watch: Subscription,
}

#[derive(Default)]
struct CollectionState {
    members: IndexMap<ClientId, Member>,
    by_id: HashMap<EntityId, ClientId>,
}

impl CollectionState {
    fn key_of(&self, entity: &Entity) -> Option<ClientId> {
        let client_id = entity.client_id();
        if self.members.contains_key(&client_id) {
            return Some(client_id);
        }
        entity.id().and_then(|id| self.by_id.get(&id).copied())
    }
}

struct CollectionInner {
    /// Whether member `Changed`/`Destroyed` notifications are forwarded.
    /// Filtered views leave this off and re-emit from the source instead.
    relay: bool,
    state: RwLock<CollectionState>,
    listeners: Arc<Listeners<CollectionEvent>>,
}

/// Shared handle to an observable, identity de-duplicated entity list.
#[derive(Clone)]
pub struct Collection {
    inner: Arc<CollectionInner>,
}

/// Non-owning reference to a [`Collection`].
#[derive(Clone)]
pub struct WeakCollection {
    inner: Weak<CollectionInner>,
}

impl WeakCollection {
    pub fn upgrade(&self) -> Option<Collection> {
        self.inner.upgrade().map(|inner| Collection { inner })
    }
}

impl Collection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::with_relay(true)
    }

    /// Create a collection holding the given entities. Duplicates are
    /// dropped, first occurrence wins.
    pub fn with_entities<I>(entities: I) -> Self
    where
        I: IntoIterator<Item = Entity>,
    {
        let collection = Self::new();
        collection.reset(entities);
        collection
    }

    /// Build a collection from a decoded JSON array of objects. Returns
    /// `None` for any other JSON shape.
    pub fn from_json(json: JsonValue) -> Option<Self> {
        match json {
            JsonValue::Array(items) => Some(Self::with_entities(
                items.into_iter().filter_map(Entity::from_json),
            )),
            _ => None,
        }
    }

    /// Collection backing a filtered view: it tracks members but does not
    /// relay their changes on its own.
    pub(crate) fn view() -> Self {
        Self::with_relay(false)
    }

    fn with_relay(relay: bool) -> Self {
        Self {
            inner: Arc::new(CollectionInner {
                relay,
                state: RwLock::new(CollectionState::default()),
                listeners: Listeners::new(),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakCollection {
        WeakCollection {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Check whether two handles refer to the same collection.
    pub fn ptr_eq(&self, other: &Collection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Append an entity unless one with the same identity is present.
    ///
    /// Returns true and emits `Added` if the entity was appended.
    pub fn add(&self, entity: Entity) -> bool {
        {
            let mut state = self.inner.state.write();
            if state.key_of(&entity).is_some() {
                return false;
            }

            let client_id = entity.client_id();
            if let Some(id) = entity.id() {
                state.by_id.insert(id, client_id);
            }
            let watch = self.watch(&entity);
            state.members.insert(
                client_id,
                Member {
                    entity: entity.clone(),
                    _watch: watch,
                },
            );
        }

        tracing::debug!(entity = %entity.client_id(), "collection add");
        self.inner.listeners.emit(&CollectionEvent::Added(entity));
        true
    }

    /// Remove the member with the same identity as `entity`, if any.
    ///
    /// Returns true and emits `Removed` if a member was removed.
    pub fn remove(&self, entity: &Entity) -> bool {
        let removed = {
            let mut state = self.inner.state.write();
            let Some(key) = state.key_of(entity) else {
                return false;
            };
            let Some(member) = state.members.shift_remove(&key) else {
                return false;
            };
            if let Some(id) = member.entity.id() {
                if state.by_id.get(&id) == Some(&key) {
                    state.by_id.remove(&id);
                }
            }
            member
        };

        let Member { entity, _watch } = removed;
        drop(_watch);

        tracing::debug!(entity = %entity.client_id(), "collection remove");
        self.inner.listeners.emit(&CollectionEvent::Removed(entity));
        true
    }

    /// Replace the whole membership and emit a single `Reset`.
    ///
    /// Duplicates in `entities` are dropped, first occurrence wins.
    pub fn reset<I>(&self, entities: I)
    where
        I: IntoIterator<Item = Entity>,
    {
        let mut next = CollectionState::default();
        for entity in entities {
            if next.key_of(&entity).is_some() {
                continue;
            }
            let client_id = entity.client_id();
            if let Some(id) = entity.id() {
                next.by_id.insert(id, client_id);
            }
            let watch = self.watch(&entity);
            next.members.insert(
                client_id,
                Member {
                    entity,
                    _watch: watch,
                },
            );
        }

        let len = next.members.len();
        let previous = std::mem::replace(&mut *self.inner.state.write(), next);
        drop(previous);

        tracing::debug!(len, "collection reset");
        self.inner.listeners.emit(&CollectionEvent::Reset);
    }

    /// Check membership by identity.
    pub fn contains(&self, entity: &Entity) -> bool {
        self.inner.state.read().key_of(entity).is_some()
    }

    /// Members satisfying `predicate`, in order. Emits nothing.
    pub fn select<F>(&self, predicate: F) -> Vec<Entity>
    where
        F: Fn(&Entity) -> bool,
    {
        self.to_vec()
            .into_iter()
            .filter(|entity| predicate(entity))
            .collect()
    }

    /// First member satisfying `predicate`.
    pub fn find<F>(&self, predicate: F) -> Option<Entity>
    where
        F: Fn(&Entity) -> bool,
    {
        self.to_vec().into_iter().find(|entity| predicate(entity))
    }

    /// Member with the given server identity.
    pub fn get(&self, id: &EntityId) -> Option<Entity> {
        let state = self.inner.state.read();
        state
            .by_id
            .get(id)
            .and_then(|client_id| state.members.get(client_id))
            .map(|member| member.entity.clone())
    }

    /// Member at `index` in iteration order.
    pub fn at(&self, index: usize) -> Option<Entity> {
        self.inner
            .state
            .read()
            .members
            .get_index(index)
            .map(|(_, member)| member.entity.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.state.read().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.read().members.is_empty()
    }

    /// Snapshot of the members in order.
    pub fn to_vec(&self) -> Vec<Entity> {
        self.inner
            .state
            .read()
            .members
            .values()
            .map(|member| member.entity.clone())
            .collect()
    }

    /// Value of `field` for every member, `Null` where it is missing.
    pub fn pluck(&self, field: &str) -> Vec<Value> {
        self.to_vec()
            .iter()
            .map(|entity| entity.get(field).unwrap_or_default())
            .collect()
    }

    /// Server identities of the members, in order.
    pub fn ids(&self) -> Vec<Option<EntityId>> {
        self.to_vec().iter().map(Entity::id).collect()
    }

    /// Create a live view of the members matching `predicate`.
    pub fn filtered(&self, predicate: Predicate) -> FilteredCollection {
        FilteredCollection::new(self.clone(), predicate)
    }

    /// Attach a listener to this collection's notifications.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&CollectionEvent) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(listener)
    }

    /// Get the number of attached listeners.
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Encode as a JSON array of member objects.
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Array(self.to_vec().iter().map(Entity::to_json).collect())
    }

    /// Emit `Changed` for a current member without touching membership.
    pub(crate) fn notify_changed(&self, entity: &Entity) {
        self.inner
            .listeners
            .emit(&CollectionEvent::Changed(entity.clone()));
    }

    fn member(&self, client_id: ClientId) -> Option<Entity> {
        self.inner
            .state
            .read()
            .members
            .get(&client_id)
            .map(|member| member.entity.clone())
    }

    fn watch(&self, entity: &Entity) -> Subscription {
        let collection = self.downgrade();
        let client_id = entity.client_id();
        entity.subscribe(move |event| {
            if let Some(collection) = collection.upgrade() {
                collection.on_member_event(client_id, event);
            }
        })
    }

    fn on_member_event(&self, client_id: ClientId, event: &EntityEvent) {
        match event {
            EntityEvent::FieldChanged { field } if field == ID_FIELD => {
                let duplicate = {
                    let mut state = self.inner.state.write();
                    let member = state.members.get(&client_id);
                    let Some(entity) = member.map(|member| member.entity.clone()) else {
                        return;
                    };
                    let Some(id) = entity.id() else {
                        return;
                    };
                    match state.by_id.get(&id).copied() {
                        Some(holder) if holder != client_id => Some((entity, id)),
                        _ => {
                            state.by_id.insert(id, client_id);
                            None
                        }
                    }
                };

                // The member saved first keeps the identity.
                if let Some((entity, id)) = duplicate {
                    tracing::warn!(
                        entity = %client_id,
                        %id,
                        "dropping member saved with a duplicate id"
                    );
                    self.remove(&entity);
                }
            }
            EntityEvent::FieldChanged { .. } => {}
            EntityEvent::Changed if self.inner.relay => {
                if let Some(entity) = self.member(client_id) {
                    tracing::trace!(entity = %client_id, "relaying member change");
                    self.notify_changed(&entity);
                }
            }
            EntityEvent::Destroyed if self.inner.relay => {
                if let Some(entity) = self.member(client_id) {
                    self.remove(&entity);
                }
            }
            EntityEvent::Changed | EntityEvent::Destroyed => {}
        }
    }
}

impl Default for Collection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("len", &self.len())
            .field("relay", &self.inner.relay)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
