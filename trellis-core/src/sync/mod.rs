//! Persistence
//!
//! The crate does not talk to a server itself. It sends [`SaveRequest`]s to
//! a [`Store`] and reacts to the completion callback: merging returned
//! attributes after a save, and removing the entity from every collection
//! after a destroy.

mod persist;
mod store;

pub use store::{Attributes, Completion, MemoryStore, SaveMethod, SaveRequest, Store};
