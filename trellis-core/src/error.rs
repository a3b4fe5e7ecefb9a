//! Error types.
//!
//! Only programmer errors and collaborator failures are errors here.
//! Idempotent no-ops (adding a present entity, removing an absent one) are
//! reported through `bool` return values instead.

use thiserror::Error;

use crate::model::EntityId;

/// Errors raised by the entity model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// An entity that already has a server identity was given a different one.
    #[error("entity already has id {current}, refusing to reassign it to {requested}")]
    IdentityReassigned {
        current: EntityId,
        requested: EntityId,
    },
}

/// Failures reported by a [`Store`](crate::sync::Store) through its
/// completion callback.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PersistError {
    /// The entity has no URL root, so there is nowhere to send it.
    #[error("entity has no url root")]
    MissingUrlRoot,

    /// The store has no record at the given path.
    #[error("no record at {0}")]
    NotFound(String),

    /// The store refused the request.
    #[error("store rejected request: {0}")]
    Rejected(String),

    /// The store answered with attributes the model could not apply.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Failures while loading configuration such as a query schema.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate facet name: {0}")]
    DuplicateFacet(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassignment_message_names_both_ids() {
        let err = ModelError::IdentityReassigned {
            current: EntityId::from(1),
            requested: EntityId::from(2),
        };
        assert_eq!(
            err.to_string(),
            "entity already has id 1, refusing to reassign it to 2"
        );
    }

    #[test]
    fn model_error_converts_into_persist_error() {
        let err: PersistError = ModelError::IdentityReassigned {
            current: EntityId::from(3),
            requested: EntityId::from(4),
        }
        .into();
        assert!(matches!(err, PersistError::Model(_)));
    }
}
