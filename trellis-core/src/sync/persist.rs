//! Saving and destroying entities through a [`Store`].
//!
//! The completion callback is the "saved" signal: callers decide what to do
//! with the entity (typically add it to a collection) once it fires with
//! `Ok`. A failure leaves the entity exactly as the caller left it.

use super::store::{Attributes, SaveMethod, SaveRequest, Store};
use crate::error::{ModelError, PersistError};
use crate::model::{Entity, EntityId, Value, ID_FIELD};

impl Entity {
    /// Apply `changes` locally, then persist the entity.
    ///
    /// Unsaved entities are created under their URL root; saved ones are
    /// updated at their own URL. On success the attributes returned by the
    /// store are merged back (assigning the server identity on create)
    /// before `on_saved` runs.
    pub fn save<I, K, V, F>(&self, store: &dyn Store, changes: I, on_saved: F)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
        F: FnOnce(Result<Entity, PersistError>) + Send + 'static,
    {
        self.set(changes);

        let Some(path) = self.url() else {
            on_saved(Err(PersistError::MissingUrlRoot));
            return;
        };
        let method = if self.is_new() {
            SaveMethod::Create
        } else {
            SaveMethod::Update
        };

        tracing::debug!(entity = %self.client_id(), ?method, %path, "saving entity");
        let request = SaveRequest {
            method,
            path,
            body: self.to_json(),
        };

        let entity = self.clone();
        store.save(
            request,
            Box::new(move |outcome| {
                let result = outcome
                    .and_then(|attributes| entity.apply_attributes(attributes))
                    .map(|()| entity);
                if let Err(err) = &result {
                    tracing::debug!(error = %err, "save failed");
                }
                on_saved(result);
            }),
        );
    }

    /// Delete the entity from its store.
    ///
    /// On success every collection holding the entity removes it. Entities
    /// that were never saved skip the store.
    pub fn destroy<F>(&self, store: &dyn Store, on_done: F)
    where
        F: FnOnce(Result<(), PersistError>) + Send + 'static,
    {
        if self.is_new() {
            self.notify_destroyed();
            on_done(Ok(()));
            return;
        }
        let Some(path) = self.url() else {
            on_done(Err(PersistError::MissingUrlRoot));
            return;
        };

        let entity = self.clone();
        store.destroy(
            path,
            Box::new(move |outcome| {
                if outcome.is_ok() {
                    entity.notify_destroyed();
                }
                on_done(outcome);
            }),
        );
    }

    /// Merge attributes returned by a store.
    fn apply_attributes(&self, attributes: Attributes) -> Result<(), PersistError> {
        let fields: Vec<(String, Value)> = attributes
            .into_iter()
            .map(|(field, value)| (field, Value::from_json(value)))
            .collect();

        let returned_id = fields
            .iter()
            .find(|(field, _)| field == ID_FIELD)
            .and_then(|(_, value)| EntityId::from_value(value));
        if let (Some(current), Some(requested)) = (self.id(), returned_id) {
            if current != requested {
                return Err(ModelError::IdentityReassigned { current, requested }.into());
            }
        }

        self.set(fields.into_iter().filter(|(_, value)| !is_echoed_relation(value)));
        Ok(())
    }
}

/// Nested collections come back from the store as fresh handles; keeping
/// the local ones avoids a spurious change for every save.
fn is_echoed_relation(value: &Value) -> bool {
    matches!(value, Value::Collection(_) | Value::Entity(_))
}
