//! Observable Entity
//!
//! An [`Entity`] is a mutable record of named fields, shared through a
//! cheap-to-clone handle. Every clone refers to the same record.
//!
//! # Identity
//!
//! Each entity gets a [`ClientId`] when it is constructed and may later
//! receive a server-assigned [`EntityId`]. The server id is write-once:
//! [`Entity::assign_id`] refuses to replace it with a different one.
//!
//! # Notifications
//!
//! [`Entity::set`] merges fields and then emits, in order:
//!
//! 1. one [`EntityEvent::FieldChanged`] per field whose value actually changed
//! 2. a single [`EntityEvent::Changed`], only if step 1 emitted anything
//!
//! Listeners run after the entity's internal lock has been released, so a
//! listener can read the entity (or set it again) freely.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use smallvec::SmallVec;

use super::value::Value;
use crate::error::ModelError;
use crate::reactive::subscription::{Listeners, Subscription};
use crate::reactive::Collection;

/// Field name that carries the server identity in JSON and in `set`.
pub const ID_FIELD: &str = "id";

/// Ordered field map of an entity.
pub type Fields = IndexMap<String, Value>;

/// Process-unique identifier assigned to every entity at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    /// Generate a new unique client ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Opaque identity assigned by the server when an entity is first saved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Int(u64),
    Key(String),
}

impl EntityId {
    /// Read an id out of a field value. Only non-negative integers and
    /// strings qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) if number.fract() == 0.0 && *number >= 0.0 => {
                Some(EntityId::Int(*number as u64))
            }
            Value::Text(key) => Some(EntityId::Key(key.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            EntityId::Int(id) => Value::from(*id),
            EntityId::Key(key) => Value::from(key.as_str()),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(id) => write!(f, "{id}"),
            EntityId::Key(key) => f.write_str(key),
        }
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        EntityId::Int(id)
    }
}

impl From<&str> for EntityId {
    fn from(key: &str) -> Self {
        EntityId::Key(key.to_owned())
    }
}

impl From<String> for EntityId {
    fn from(key: String) -> Self {
        EntityId::Key(key)
    }
}

/// Notification emitted by an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityEvent {
    /// A single field took a new value.
    FieldChanged { field: String },
    /// At least one field changed during one `set` call.
    Changed,
    /// The entity was destroyed in its store; holders should drop it.
    Destroyed,
}

struct EntityState {
    id: Option<EntityId>,
    url_root: Option<Arc<str>>,
    fields: Fields,
}

struct EntityInner {
    client_id: ClientId,
    state: RwLock<EntityState>,
    listeners: Arc<Listeners<EntityEvent>>,
}

/// Shared handle to an observable record.
#[derive(Clone)]
pub struct Entity {
    inner: Arc<EntityInner>,
}

impl Entity {
    /// Create an unsaved entity with no fields.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EntityInner {
                client_id: ClientId::new(),
                state: RwLock::new(EntityState {
                    id: None,
                    url_root: None,
                    fields: Fields::new(),
                }),
                listeners: Listeners::new(),
            }),
        }
    }

    /// Create an entity with initial fields. No notifications are emitted.
    ///
    /// An `id` entry becomes the entity's identity. A null `id` leaves the
    /// entity unsaved; any other value that is not an id is logged and
    /// dropped.
    pub fn with_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let entity = Self::new();
        {
            let mut state = entity.inner.state.write();
            for (field, value) in fields {
                let field = field.into();
                let value = value.into();
                if field == ID_FIELD {
                    state.id = EntityId::from_value(&value);
                    if state.id.is_none() && !value.is_null() {
                        tracing::warn!(
                            entity = %entity.client_id(),
                            ?value,
                            "ignoring non-id value for `id`"
                        );
                    }
                } else {
                    state.fields.insert(field, value);
                }
            }
        }
        entity
    }

    /// Build an entity from a decoded JSON object. Returns `None` for any
    /// other JSON shape.
    pub fn from_json(json: JsonValue) -> Option<Self> {
        match json {
            JsonValue::Object(object) => Some(Self::with_fields(
                object
                    .into_iter()
                    .map(|(field, value)| (field, Value::from_json(value))),
            )),
            _ => None,
        }
    }

    /// Set the URL root the entity is persisted under, e.g. `/tasks`.
    pub fn with_url_root(self, url_root: impl Into<Arc<str>>) -> Self {
        self.inner.state.write().url_root = Some(url_root.into());
        self
    }

    pub fn client_id(&self) -> ClientId {
        self.inner.client_id
    }

    /// Server identity, if the entity has been saved.
    pub fn id(&self) -> Option<EntityId> {
        self.inner.state.read().id.clone()
    }

    /// True until the entity has a server identity.
    pub fn is_new(&self) -> bool {
        self.inner.state.read().id.is_none()
    }

    pub fn url_root(&self) -> Option<Arc<str>> {
        self.inner.state.read().url_root.clone()
    }

    /// Resource path: the URL root for unsaved entities, `root/id` otherwise.
    pub fn url(&self) -> Option<String> {
        let state = self.inner.state.read();
        let root = state.url_root.as_deref()?;
        Some(match &state.id {
            Some(id) => format!("{}/{}", root.trim_end_matches('/'), id),
            None => root.to_owned(),
        })
    }

    /// Check whether two handles refer to the same record.
    pub fn ptr_eq(&self, other: &Entity) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Check whether two handles denote the same entity: the same record, or
    /// records carrying the same server identity.
    pub fn same_identity(&self, other: &Entity) -> bool {
        if self.client_id() == other.client_id() {
            return true;
        }
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Get the current value of a field. `id` reads the server identity.
    pub fn get(&self, field: &str) -> Option<Value> {
        let state = self.inner.state.read();
        if field == ID_FIELD {
            return state.id.as_ref().map(EntityId::to_value);
        }
        state.fields.get(field).cloned()
    }

    pub fn has(&self, field: &str) -> bool {
        self.get(field).map_or(false, |value| !value.is_null())
    }

    pub fn get_str(&self, field: &str) -> Option<String> {
        match self.get(field)? {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field)?.as_bool()
    }

    /// Nested collection stored in a field, e.g. a task's assigned users.
    pub fn relation(&self, field: &str) -> Option<Collection> {
        self.inner
            .state
            .read()
            .fields
            .get(field)
            .and_then(|value| value.as_collection().cloned())
    }

    /// Snapshot of all fields, in insertion order.
    pub fn fields(&self) -> Fields {
        self.inner.state.read().fields.clone()
    }

    /// Merge the given fields and notify listeners about what changed.
    ///
    /// An `id` entry assigns the server identity if the entity has none;
    /// a conflicting id is ignored and logged. Use [`Entity::assign_id`]
    /// to get the conflict as an error.
    ///
    /// Returns true if any field changed.
    pub fn set<I, K, V>(&self, fields: I) -> bool
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut changed: SmallVec<[String; 4]> = SmallVec::new();
        {
            let mut state = self.inner.state.write();
            for (field, value) in fields {
                let field = field.into();
                let value = value.into();

                if field == ID_FIELD {
                    let Some(requested) = EntityId::from_value(&value) else {
                        tracing::warn!(entity = %self.client_id(), "ignoring non-id value for `id`");
                        continue;
                    };
                    match state.id.clone() {
                        None => state.id = Some(requested),
                        Some(current) if current == requested => continue,
                        Some(current) => {
                            tracing::warn!(
                                entity = %self.client_id(),
                                %current,
                                %requested,
                                "ignoring attempt to reassign entity id"
                            );
                            continue;
                        }
                    }
                } else if state.fields.get(&field) == Some(&value) {
                    continue;
                } else {
                    state.fields.insert(field.clone(), value);
                }

                if !changed.contains(&field) {
                    changed.push(field);
                }
            }
        }

        self.notify_changed_fields(changed)
    }

    /// Remove a field. Emits the same notifications as `set` if it existed.
    pub fn unset(&self, field: &str) -> bool {
        let removed = self.inner.state.write().fields.shift_remove(field).is_some();
        if !removed {
            return false;
        }
        self.notify_changed_fields(std::iter::once(field.to_owned()).collect())
    }

    /// Assign the server identity.
    ///
    /// Assigning the identity the entity already has is a no-op; assigning
    /// a different one is an error and leaves the entity untouched.
    pub fn assign_id(&self, id: impl Into<EntityId>) -> Result<bool, ModelError> {
        let requested = id.into();
        {
            let mut state = self.inner.state.write();
            match state.id.clone() {
                Some(current) if current == requested => return Ok(false),
                Some(current) => {
                    return Err(ModelError::IdentityReassigned { current, requested })
                }
                None => state.id = Some(requested),
            }
        }
        Ok(self.notify_changed_fields(std::iter::once(ID_FIELD.to_owned()).collect()))
    }

    /// Attach a listener to this entity's notifications.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&EntityEvent) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(listener)
    }

    /// Get the number of attached listeners.
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Encode as a JSON object, `id` first when present.
    pub fn to_json(&self) -> JsonValue {
        let state = self.inner.state.read();
        let mut object = serde_json::Map::new();
        if let Some(id) = &state.id {
            object.insert(ID_FIELD.to_owned(), id.to_value().to_json());
        }
        for (field, value) in &state.fields {
            object.insert(field.clone(), value.to_json());
        }
        JsonValue::Object(object)
    }

    pub(crate) fn notify_destroyed(&self) {
        tracing::debug!(entity = %self.client_id(), "entity destroyed");
        self.inner.listeners.emit(&EntityEvent::Destroyed);
    }

    fn notify_changed_fields(&self, changed: SmallVec<[String; 4]>) -> bool {
        if changed.is_empty() {
            return false;
        }

        tracing::trace!(entity = %self.client_id(), fields = ?changed, "entity changed");
        for field in changed {
            self.inner
                .listeners
                .emit(&EntityEvent::FieldChanged { field });
        }
        self.inner.listeners.emit(&EntityEvent::Changed);
        true
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("Entity")
            .field("client_id", &self.inner.client_id)
            .field("id", &state.id)
            .field("fields", &state.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn record(entity: &Entity) -> (Arc<Mutex<Vec<EntityEvent>>>, Subscription) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let subscription = entity.subscribe(move |event| sink.lock().push(event.clone()));
        (events, subscription)
    }

    fn field_changed(field: &str) -> EntityEvent {
        EntityEvent::FieldChanged {
            field: field.to_owned(),
        }
    }

    #[test]
    fn entity_get_and_set() {
        let entity = Entity::new();
        assert_eq!(entity.get("title"), None);

        entity.set([("title", "Anchors away")]);
        assert_eq!(entity.get("title"), Some(Value::from("Anchors away")));
        assert_eq!(entity.get_str("title").as_deref(), Some("Anchors away"));
    }

    #[test]
    fn set_emits_field_changes_then_one_changed() {
        let entity = Entity::with_fields([("number", Value::from(1))]);
        let (events, _subscription) = record(&entity);

        assert!(entity.set([("number", Value::from(2)), ("other", Value::from("thing"))]));

        assert_eq!(
            *events.lock(),
            vec![field_changed("number"), field_changed("other"), EntityEvent::Changed]
        );
    }

    #[test]
    fn set_with_equal_values_emits_nothing() {
        let entity = Entity::with_fields([("title", "same"), ("state", "open")]);
        let (events, _subscription) = record(&entity);

        assert!(!entity.set([("title", "same"), ("state", "open")]));
        assert!(events.lock().is_empty());
    }

    #[test]
    fn set_reports_only_fields_that_changed() {
        let entity = Entity::with_fields([("a", 1), ("b", 2)]);
        let (events, _subscription) = record(&entity);

        entity.set([("a", 1), ("b", 3)]);
        assert_eq!(*events.lock(), vec![field_changed("b"), EntityEvent::Changed]);
    }

    #[test]
    fn repeated_field_in_one_set_is_reported_once() {
        let entity = Entity::new();
        let (events, _subscription) = record(&entity);

        entity.set([("n", 1), ("n", 2)]);
        assert_eq!(entity.get("n"), Some(Value::from(2)));
        assert_eq!(*events.lock(), vec![field_changed("n"), EntityEvent::Changed]);
    }

    #[test]
    fn unset_removes_field() {
        let entity = Entity::with_fields([("title", "x")]);
        let (events, _subscription) = record(&entity);

        assert!(entity.unset("title"));
        assert!(!entity.unset("title"));
        assert_eq!(entity.get("title"), None);
        assert_eq!(*events.lock(), vec![field_changed("title"), EntityEvent::Changed]);
    }

    #[test]
    fn identity_is_write_once() {
        let entity = Entity::new();
        assert!(entity.is_new());

        assert_eq!(entity.assign_id(5), Ok(true));
        assert_eq!(entity.assign_id(5), Ok(false));
        assert_eq!(
            entity.assign_id(6),
            Err(ModelError::IdentityReassigned {
                current: EntityId::from(5),
                requested: EntityId::from(6),
            })
        );
        assert_eq!(entity.id(), Some(EntityId::from(5)));
        assert_eq!(entity.get("id"), Some(Value::from(5)));
    }

    #[test]
    fn set_assigns_id_but_never_reassigns() {
        let entity = Entity::new();
        let (events, _subscription) = record(&entity);

        assert!(entity.set([("id", 9)]));
        assert!(!entity.set([("id", 10)]));

        assert_eq!(entity.id(), Some(EntityId::from(9)));
        assert_eq!(*events.lock(), vec![field_changed("id"), EntityEvent::Changed]);
    }

    #[test]
    fn invalid_initial_id_leaves_entity_unsaved() {
        for id in [Value::from(-1), Value::from(1.5), Value::from(true), Value::Null] {
            let entity = Entity::with_fields([("id", id), ("title", Value::from("kept"))]);

            assert!(entity.is_new());
            assert_eq!(entity.get("id"), None);
            assert_eq!(entity.get_str("title").as_deref(), Some("kept"));
        }
    }

    #[test]
    fn typed_getters_read_identity_like_get() {
        let keyed = Entity::with_fields([("id", "abc")]);
        assert_eq!(keyed.get_str("id").as_deref(), Some("abc"));
        assert_eq!(keyed.get_bool("id"), None);

        let numbered = Entity::with_fields([("id", 4)]);
        assert_eq!(numbered.get_str("id"), None);
        assert_eq!(numbered.get("id"), Some(Value::from(4)));
    }

    #[test]
    fn same_identity_by_client_or_server_id() {
        let a = Entity::with_fields([("id", 1)]);
        let b = Entity::with_fields([("id", 1)]);
        let c = Entity::new();

        assert!(a.same_identity(&a.clone()));
        assert!(a.same_identity(&b));
        assert!(!a.ptr_eq(&b));
        assert!(!a.same_identity(&c));
        assert!(!c.same_identity(&Entity::new()));
    }

    #[test]
    fn url_follows_identity() {
        let entity = Entity::new().with_url_root("/tasks");
        assert_eq!(entity.url().as_deref(), Some("/tasks"));

        entity.assign_id(12).expect("fresh entity");
        assert_eq!(entity.url().as_deref(), Some("/tasks/12"));
        assert_eq!(Entity::new().url(), None);
    }

    #[test]
    fn json_round_trip_keeps_identity_and_nested_collections() {
        let entity = Entity::from_json(json!({
            "id": 1,
            "title": "Anchors away",
            "assigned_users": [{ "email": "alice@example.com" }],
            "complete": true,
        }))
        .expect("object");

        assert_eq!(entity.id(), Some(EntityId::from(1)));
        assert_eq!(entity.get_bool("complete"), Some(true));
        assert_eq!(entity.relation("assigned_users").map(|users| users.len()), Some(1));
        assert_eq!(entity.to_json()["assigned_users"][0]["email"], json!("alice@example.com"));
        assert_eq!(entity.to_json()["id"], json!(1));
        assert!(Entity::from_json(json!("not an object")).is_none());
    }

    #[test]
    fn listener_can_read_entity_during_notification() {
        let entity = Entity::with_fields([("n", 1)]);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let reader = entity.clone();
        let sink = seen.clone();
        let _subscription = entity.subscribe(move |event| {
            if *event == EntityEvent::Changed {
                sink.lock().push(reader.get("n"));
            }
        });

        entity.set([("n", 2)]);
        assert_eq!(*seen.lock(), vec![Some(Value::from(2))]);
    }
}
