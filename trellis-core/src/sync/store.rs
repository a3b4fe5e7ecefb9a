//! The persistence seam and an in-process store.

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::PersistError;
use crate::model::ID_FIELD;

/// Attributes returned by a store after a save.
pub type Attributes = Map<String, JsonValue>;

/// Completion callback handed to a [`Store`].
pub type Completion<T> = Box<dyn FnOnce(Result<T, PersistError>) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveMethod {
    /// First save of an unsaved entity, sent to the URL root.
    Create,
    /// Later saves, sent to `root/id`.
    Update,
}

/// A save sent to a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub method: SaveMethod,
    pub path: String,
    pub body: JsonValue,
}

/// Remote storage for entities.
///
/// Implementations call `done` exactly once, either before returning or at
/// any later point. Nothing is retried on failure.
pub trait Store: Send + Sync {
    /// Persist an entity; on success `done` receives the stored attributes,
    /// including the `id` for creates.
    fn save(&self, request: SaveRequest, done: Completion<Attributes>);

    /// Delete the record at `path`.
    fn destroy(&self, path: String, done: Completion<()>);
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    records: IndexMap<String, Attributes>,
    failure: Option<String>,
}

/// A [`Store`] keeping records in memory and completing synchronously.
///
/// Ids are assigned sequentially from 1. [`MemoryStore::fail_with`] makes
/// every following request fail, which is handy for exercising error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every following request with `reason`.
    pub fn fail_with(&self, reason: impl Into<String>) {
        self.state.lock().failure = Some(reason.into());
    }

    /// Accept requests again.
    pub fn recover(&self) {
        self.state.lock().failure = None;
    }

    /// Stored attributes at `path`.
    pub fn get(&self, path: &str) -> Option<Attributes> {
        self.state.lock().records.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().records.is_empty()
    }

    fn apply_save(&self, request: SaveRequest) -> Result<Attributes, PersistError> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.failure {
            return Err(PersistError::Rejected(reason.clone()));
        }

        let JsonValue::Object(mut body) = request.body else {
            return Err(PersistError::Rejected("body is not an object".to_owned()));
        };

        match request.method {
            SaveMethod::Create => {
                state.next_id += 1;
                let id = state.next_id;
                body.insert(ID_FIELD.to_owned(), JsonValue::from(id));
                let path = format!("{}/{}", request.path.trim_end_matches('/'), id);
                state.records.insert(path, body.clone());
                Ok(body)
            }
            SaveMethod::Update => {
                let record = state
                    .records
                    .get_mut(&request.path)
                    .ok_or_else(|| PersistError::NotFound(request.path.clone()))?;
                for (field, value) in body {
                    record.insert(field, value);
                }
                Ok(record.clone())
            }
        }
    }

    fn apply_destroy(&self, path: &str) -> Result<(), PersistError> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.failure {
            return Err(PersistError::Rejected(reason.clone()));
        }
        state
            .records
            .shift_remove(path)
            .map(|_| ())
            .ok_or_else(|| PersistError::NotFound(path.to_owned()))
    }
}

impl Store for MemoryStore {
    fn save(&self, request: SaveRequest, done: Completion<Attributes>) {
        tracing::debug!(method = ?request.method, path = %request.path, "memory store save");
        let outcome = self.apply_save(request);
        done(outcome);
    }

    fn destroy(&self, path: String, done: Completion<()>) {
        tracing::debug!(%path, "memory store destroy");
        let outcome = self.apply_destroy(&path);
        done(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn save(store: &MemoryStore, request: SaveRequest) -> Result<Attributes, PersistError> {
        let slot = Arc::new(Mutex::new(None));
        let sink = slot.clone();
        store.save(request, Box::new(move |outcome| *sink.lock() = Some(outcome)));
        let outcome = slot.lock().take();
        outcome.expect("memory store completes synchronously")
    }

    #[test]
    fn create_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let create = |title: &str| SaveRequest {
            method: SaveMethod::Create,
            path: "/tasks".to_owned(),
            body: json!({ "title": title }),
        };

        let first = save(&store, create("a")).expect("saved");
        let second = save(&store, create("b")).expect("saved");

        assert_eq!(first["id"], json!(1));
        assert_eq!(second["id"], json!(2));
        assert_eq!(store.get("/tasks/2").map(|r| r["title"].clone()), Some(json!("b")));
    }

    #[test]
    fn update_requires_existing_record() {
        let store = MemoryStore::new();
        let outcome = save(
            &store,
            SaveRequest {
                method: SaveMethod::Update,
                path: "/tasks/9".to_owned(),
                body: json!({ "title": "x" }),
            },
        );
        assert_eq!(outcome, Err(PersistError::NotFound("/tasks/9".to_owned())));
    }

    #[test]
    fn failure_mode_rejects_until_recovered() {
        let store = MemoryStore::new();
        store.fail_with("offline");

        let request = SaveRequest {
            method: SaveMethod::Create,
            path: "/tasks".to_owned(),
            body: json!({}),
        };
        assert_eq!(
            save(&store, request.clone()),
            Err(PersistError::Rejected("offline".to_owned()))
        );

        store.recover();
        assert!(save(&store, request).is_ok());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn request_method_serialises_lowercase() {
        assert_eq!(serde_json::to_value(SaveMethod::Create).expect("serialise"), json!("create"));
    }
}
