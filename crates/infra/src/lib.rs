//! Infrastructure layer: event store, command dispatch, read models, chat storage.
//!
//! Everything here is in-memory; the traits are the seams a durable backend
//! would plug into.

pub mod chat_store;
pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
