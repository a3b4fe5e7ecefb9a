//! Entity Model
//!
//! Entities are the records the rest of the crate observes: tasks, users,
//! attachments. Each one is a bag of named [`Value`]s with change
//! notification, plus an identity used to de-duplicate it inside
//! collections.

mod entity;
mod value;

pub use entity::{ClientId, Entity, EntityEvent, EntityId, Fields, ID_FIELD};
pub use value::Value;
